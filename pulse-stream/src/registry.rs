//! Handler registration with per-subscription removal.
//!
//! The registry maps `(channel key, event type)` to an insertion-ordered list
//! of handlers. Each registration gets its own id so removal never depends on
//! closure identity, and independent subscribers to the same event can be
//! removed without affecting each other. The registry is deliberately unaware
//! of connection state: registering or removing handlers never touches a
//! connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::types::ChannelKey;

/// Callback invoked for every matching inbound event.
///
/// Handlers must not block; long-running work belongs on a task the handler
/// spawns and forgets.
pub type EventHandler = Arc<dyn Fn(&ChannelKey, &str, &Value) + Send + Sync>;

/// Unique identifier for one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Registration {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Thread-safe registry of event handlers.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: RwLock<HashMap<(ChannelKey, String), Vec<Registration>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for `(key, event_type)` and return its id.
    ///
    /// Handlers for the same pair are invoked in registration order.
    pub fn subscribe(
        &self,
        key: &ChannelKey,
        event_type: &str,
        handler: EventHandler,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut handlers = self.handlers.write();
        handlers
            .entry((key.clone(), event_type.to_string()))
            .or_default()
            .push(Registration { id, handler });

        tracing::debug!(channel = %key, event = event_type, subscription = %id, "handler registered");
        id
    }

    /// Remove exactly one registration. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut handlers = self.handlers.write();
        for registrations in handlers.values_mut() {
            if let Some(pos) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(pos);
                break;
            }
        }
        handlers.retain(|_, registrations| !registrations.is_empty());
    }

    /// Snapshot the handlers for `(key, event_type)` in registration order.
    ///
    /// Returns clones so callers never invoke handlers under the registry
    /// lock.
    pub fn handlers(&self, key: &ChannelKey, event_type: &str) -> Vec<EventHandler> {
        let handlers = self.handlers.read();
        handlers
            .get(&(key.clone(), event_type.to_string()))
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|r| Arc::clone(&r.handler))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of live registrations.
    pub fn count(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    /// Registrations per channel key.
    pub fn stats(&self) -> HashMap<ChannelKey, usize> {
        let handlers = self.handlers.read();
        let mut stats = HashMap::new();
        for ((key, _), registrations) in handlers.iter() {
            *stats.entry(key.clone()).or_insert(0) += registrations.len();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::Channel;

    fn recording_handler(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> EventHandler {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Arc::new(move |_, _, _| log.lock().unwrap().push(tag.clone()))
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let key = Channel::global().key();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(&key, "update", recording_handler(&log, "first"));
        registry.subscribe(&key, "update", recording_handler(&log, "second"));
        registry.subscribe(&key, "update", recording_handler(&log, "third"));

        for handler in registry.handlers(&key, "update") {
            handler(&key, "update", &Value::Null);
        }

        assert_eq!(*log.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_registration() {
        let registry = SubscriptionRegistry::new();
        let key = Channel::global().key();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = registry.subscribe(&key, "update", recording_handler(&log, "first"));
        registry.subscribe(&key, "update", recording_handler(&log, "second"));

        registry.unsubscribe(first);

        for handler in registry.handlers(&key, "update") {
            handler(&key, "update", &Value::Null);
        }

        assert_eq!(*log.lock().unwrap(), ["second"]);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unsubscribe_unknown_id_is_noop() {
        let registry = SubscriptionRegistry::new();
        let key = Channel::global().key();

        let id = registry.subscribe(&key, "update", Arc::new(|_, _, _| {}));
        registry.unsubscribe(id);
        registry.unsubscribe(id);

        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn keys_and_event_types_are_isolated() {
        let registry = SubscriptionRegistry::new();
        let global = Channel::global().key();
        let conversation = Channel::conversation("c1").unwrap().key();

        registry.subscribe(&global, "update", Arc::new(|_, _, _| {}));
        registry.subscribe(&conversation, "update", Arc::new(|_, _, _| {}));
        registry.subscribe(&conversation, "delete", Arc::new(|_, _, _| {}));

        assert_eq!(registry.handlers(&global, "update").len(), 1);
        assert_eq!(registry.handlers(&conversation, "update").len(), 1);
        assert_eq!(registry.handlers(&global, "delete").len(), 0);

        let stats = registry.stats();
        assert_eq!(stats.get(&conversation), Some(&2));
    }

    #[test]
    fn subscription_ids_are_unique() {
        let registry = SubscriptionRegistry::new();
        let key = Channel::global().key();

        let a = registry.subscribe(&key, "x", Arc::new(|_, _, _| {}));
        let b = registry.subscribe(&key, "x", Arc::new(|_, _, _| {}));
        assert_ne!(a, b);
    }
}
