//! Room registry.
//!
//! `joined` is the authoritative replay list: every room in it is re-sent to
//! the server on each transition into Connected. `pending` holds the rooms
//! recorded while offline that have not been sent on the current connection
//! yet. Room joins never go through the message queue, so a full queue can
//! never drop them.

use std::collections::BTreeSet;

use tracing::debug;

use crate::protocol::ClientFrame;
use crate::transport::Outbox;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    joined: BTreeSet<String>,
    pending: BTreeSet<String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `room` and send the join when online.
    ///
    /// Returns `true` if the room is joined on the wire right now or was
    /// already recorded. Joining a room that is already joined while online
    /// sends nothing.
    pub(crate) fn join(&mut self, room: &str, outbox: Option<&Outbox>) -> bool {
        let newly_added = self.joined.insert(room.to_string());
        match outbox {
            Some(outbox) => {
                if newly_added || self.pending.contains(room) {
                    self.pending.remove(room);
                    return outbox.send(ClientFrame::JoinRoom {
                        room: room.to_string(),
                    });
                }
                true
            }
            None => {
                self.pending.insert(room.to_string());
                debug!(room, "room join recorded for replay on connect");
                !newly_added
            }
        }
    }

    /// Forget `room` and send the leave when online. Always succeeds.
    pub(crate) fn leave(&mut self, room: &str, outbox: Option<&Outbox>) -> bool {
        let was_joined = self.joined.remove(room);
        let was_pending = self.pending.remove(room);
        if let Some(outbox) = outbox {
            if was_joined && !was_pending {
                outbox.send(ClientFrame::LeaveRoom {
                    room: room.to_string(),
                });
            }
        }
        true
    }

    /// Send a join for every recorded room. Returns how many were sent.
    pub(crate) fn replay(&mut self, outbox: &Outbox) -> usize {
        let mut sent = 0;
        for room in &self.joined {
            if outbox.send(ClientFrame::JoinRoom { room: room.clone() }) {
                sent += 1;
            }
        }
        self.pending.clear();
        sent
    }

    /// The connection is gone: every recorded room awaits replay again.
    pub fn mark_offline(&mut self) {
        self.pending = self.joined.clone();
    }

    pub fn contains(&self, room: &str) -> bool {
        self.joined.contains(room)
    }

    /// Recorded rooms in sorted order.
    pub fn rooms(&self) -> Vec<String> {
        self.joined.iter().cloned().collect()
    }

    /// Rooms not yet sent on the current connection.
    pub fn pending(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }

    pub fn clear(&mut self) {
        self.joined.clear();
        self.pending.clear();
    }
}
