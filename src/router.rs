//! Publish/subscribe tables for server events and lifecycle observers.
//!
//! Handlers run in registration order. Each invocation is isolated with
//! `catch_unwind`, so a panicking consumer callback is logged and the
//! remaining handlers still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::event::EventName;

/// Handle returned by every registration, used to remove that handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Handler for a server-pushed event.
pub type EventHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync + 'static>;

/// Handler for a lifecycle payload of type `T`.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Event name → ordered handler list.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Vec<(HandlerId, EventHandler)>>,
    next_id: u64,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh id. Shared with lifecycle observers so ids never collide.
    pub fn allocate_id(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    pub fn on(&mut self, event: &EventName, handler: EventHandler) -> HandlerId {
        let id = self.allocate_id();
        self.insert(event, id, handler);
        id
    }

    /// Register `handler` under an existing id (one subscription listening
    /// to several events).
    pub fn insert(&mut self, event: &EventName, id: HandlerId, handler: EventHandler) {
        self.handlers
            .entry(event.as_str().to_string())
            .or_default()
            .push((id, handler));
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn off(&mut self, event: &EventName, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(event.as_str()) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(event.as_str());
        }
        removed
    }

    /// Remove every handler for `event`. Returns how many were removed.
    pub fn off_all(&mut self, event: &EventName) -> usize {
        self.handlers
            .remove(event.as_str())
            .map_or(0, |list| list.len())
    }

    /// Snapshot of the handlers for `event`, in invocation order.
    pub fn handlers(&self, event: &EventName) -> Vec<EventHandler> {
        self.handlers
            .get(event.as_str())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn handler_count(&self, event: &EventName) -> usize {
        self.handlers.get(event.as_str()).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self
            .handlers
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        events.sort_unstable();
        f.debug_struct("EventRouter").field("events", &events).finish()
    }
}

/// Ordered list of lifecycle observers.
pub struct Observers<T> {
    list: Vec<(HandlerId, Observer<T>)>,
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    pub fn add(&mut self, id: HandlerId, observer: Observer<T>) {
        self.list.push((id, observer));
    }

    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.list.len();
        self.list.retain(|(existing, _)| *existing != id);
        self.list.len() != before
    }

    pub fn snapshot(&self) -> Vec<Observer<T>> {
        self.list.iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.list.len())
            .finish()
    }
}

/// Invoke every handler with `payload`. Returns how many panicked.
pub fn invoke_guarded<T: ?Sized>(
    label: &str,
    handlers: &[Arc<dyn Fn(&T) + Send + Sync + 'static>],
    payload: &T,
) -> usize {
    let mut failures = 0;
    for handler in handlers {
        if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
            failures += 1;
            error!(handler = label, "event handler panicked");
        }
    }
    failures
}
