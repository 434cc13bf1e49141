//! Wire frames exchanged with the realtime server.
//!
//! Every frame is a JSON text message, adjacently tagged as
//! `{"type": "Variant", "data": {…}}`. Application payloads are carried as
//! opaque [`serde_json::Value`]s; the client never interprets them beyond
//! routing by event name.

use serde::{Deserialize, Serialize};

/// Identifier correlating an emitted event with the server's acknowledgement.
pub type AckId = u64;

// ── Client → server ─────────────────────────────────────────────────

/// Frames sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientFrame {
    /// Application event emitted by a consumer.
    Event {
        event: String,
        #[serde(default)]
        data: serde_json::Value,
        /// Present when the emitter registered an acknowledgement callback.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<AckId>,
    },
    /// Subscribe this connection to a room.
    JoinRoom { room: String },
    /// Unsubscribe this connection from a room.
    LeaveRoom { room: String },
    /// Heartbeat probe. `timestamp` is unix milliseconds at send time.
    Ping { timestamp: u64 },
}

impl ClientFrame {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Ping { .. } => "ping",
        }
    }
}

// ── Server → client ─────────────────────────────────────────────────

/// Frames sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerFrame {
    /// Application event pushed by the server; routed to `on()` handlers.
    Event {
        event: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Acknowledgement for a previously emitted event.
    Ack {
        id: AckId,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Heartbeat reply. Servers may echo the ping timestamp.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_without_ack_omits_field() {
        let frame = ClientFrame::Event {
            event: "submit_answer".into(),
            data: json!({"question": 3}),
            ack: None,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "Event");
        assert_eq!(value["data"]["event"], "submit_answer");
        assert!(value["data"].get("ack").is_none());
    }

    #[test]
    fn pong_without_timestamp_parses() {
        let frame: ServerFrame = serde_json::from_str(r#"{"type":"Pong","data":{}}"#).unwrap();
        assert_eq!(frame, ServerFrame::Pong { timestamp: None });
    }

    #[test]
    fn server_event_data_defaults_to_null() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"Event","data":{"event":"notification"}}"#).unwrap();
        match frame {
            ServerFrame::Event { event, data } => {
                assert_eq!(event, "notification");
                assert!(data.is_null());
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn frame_kinds() {
        assert_eq!(ClientFrame::Ping { timestamp: 0 }.kind(), "ping");
        assert_eq!(
            ClientFrame::JoinRoom { room: "a".into() }.kind(),
            "join_room"
        );
    }
}
