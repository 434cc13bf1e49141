//! Bounded FIFO of events emitted while offline.

use std::collections::VecDeque;
use std::fmt;

use crate::event::EventName;

/// Acknowledgement callback attached to an emitted event.
pub type AckCallback = Box<dyn FnOnce(serde_json::Value) + Send + 'static>;

/// An event waiting for the next connection.
pub struct QueuedMessage {
    pub event: EventName,
    pub data: serde_json::Value,
    pub ack: Option<AckCallback>,
}

impl fmt::Debug for QueuedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedMessage")
            .field("event", &self.event)
            .field("data", &self.data)
            .field("has_ack", &self.ack.is_some())
            .finish()
    }
}

/// Bounded outbound queue. Its length never exceeds `capacity`.
#[derive(Debug)]
pub struct MessageQueue {
    items: VecDeque<QueuedMessage>,
    capacity: usize,
    enabled: bool,
}

impl MessageQueue {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            enabled,
        }
    }

    /// Append `message`, or hand it back if the queue is disabled or full.
    pub fn push(&mut self, message: QueuedMessage) -> Result<(), QueuedMessage> {
        if !self.enabled || self.items.len() >= self.capacity {
            return Err(message);
        }
        self.items.push_back(message);
        Ok(())
    }

    /// Take the whole queue in insertion order, leaving it empty.
    ///
    /// The flush iterates this snapshot, so anything pushed while flushing
    /// lands in the live queue and waits for the next pass.
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        self.items.drain(..).collect()
    }

    /// Disabling does not discard what is already queued.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
