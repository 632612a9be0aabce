//! Frame-to-handler dispatch.
//!
//! The dispatcher routes one inbound frame to every handler registered for
//! its `(channel, event type)` pair, in registration order. Failures stay
//! local: a frame whose payload does not deserialize is logged and dropped
//! without touching the stream, and a handler that panics is fenced off so
//! the remaining handlers and subsequent frames are unaffected.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::StreamError;
use crate::registry::SubscriptionRegistry;
use crate::sse::SseFrame;
use crate::types::ChannelKey;

/// Reserved lifecycle event synthesized when a channel connects.
pub const OPEN_EVENT: &str = "open";

/// Reserved lifecycle event synthesized when a channel fails.
pub const ERROR_EVENT: &str = "error";

/// Routes inbound frames and synthesized lifecycle events to handlers.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Deserialize a frame's payload and dispatch it.
    ///
    /// Frames without a payload (retry hints, id-only frames) are skipped.
    /// A payload that is not valid JSON drops only this frame.
    pub fn dispatch_frame(&self, key: &ChannelKey, frame: &SseFrame) {
        if frame.data.is_empty() {
            tracing::trace!(channel = %key, event = %frame.event, "skipping frame without payload");
            return;
        }

        let payload: Value = match serde_json::from_str(&frame.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    channel = %key,
                    event = %frame.event,
                    error = %e,
                    "dropping frame with malformed payload"
                );
                return;
            }
        };

        self.dispatch(key, &frame.event, &payload);
    }

    /// Invoke every handler for `(key, event_type)` in registration order.
    ///
    /// Each handler runs behind a panic fence; one failing handler never
    /// stops the others.
    pub fn dispatch(&self, key: &ChannelKey, event_type: &str, payload: &Value) {
        for handler in self.registry.handlers(key, event_type) {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(key, event_type, payload)));
            if outcome.is_err() {
                tracing::error!(channel = %key, event = event_type, "event handler panicked");
            }
        }
    }

    /// Synthesize the reserved `"open"` lifecycle event.
    pub fn dispatch_open(&self, key: &ChannelKey) {
        self.dispatch(key, OPEN_EVENT, &Value::Null);
    }

    /// Synthesize the reserved `"error"` lifecycle event.
    pub fn dispatch_error(&self, key: &ChannelKey, error: &StreamError) {
        let payload = json!({
            "channel": key.as_str(),
            "error": error.to_string(),
        });
        self.dispatch(key, ERROR_EVENT, &payload);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::TransportError;
    use crate::types::Channel;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: data.to_string(),
            id: None,
            retry: None,
        }
    }

    #[test]
    fn dispatches_payload_to_matching_handlers() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let key = Channel::global().key();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(
            &key,
            "conversation.updated",
            Arc::new(move |_, _, payload| sink.lock().unwrap().push(payload.clone())),
        );

        dispatcher.dispatch_frame(&key, &frame("conversation.updated", r#"{"id":"c1"}"#));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["id"], "c1");
    }

    #[test]
    fn malformed_payload_drops_frame_without_blocking_next() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let key = Channel::global().key();

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        registry.subscribe(
            &key,
            "update",
            Arc::new(move |_, _, _| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch_frame(&key, &frame("update", "{not json"));
        dispatcher.dispatch_frame(&key, &frame("update", r#"{"ok":true}"#));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_rest() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let key = Channel::global().key();

        registry.subscribe(
            &key,
            "update",
            Arc::new(|_, _, _| panic!("handler failure")),
        );

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        registry.subscribe(
            &key,
            "update",
            Arc::new(move |_, _, _| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch_frame(&key, &frame("update", "{}"));
        dispatcher.dispatch_frame(&key, &frame("update", "{}"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn frames_without_payload_are_skipped() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let key = Channel::global().key();

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        registry.subscribe(
            &key,
            "message",
            Arc::new(move |_, _, _| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let retry_only = SseFrame {
            event: "message".to_string(),
            data: String::new(),
            id: None,
            retry: Some(Duration::from_secs(3)),
        };
        dispatcher.dispatch_frame(&key, &retry_only);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn error_event_carries_channel_and_detail() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let key = Channel::conversation("c9").unwrap().key();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(
            &key,
            ERROR_EVENT,
            Arc::new(move |_, _, payload| sink.lock().unwrap().push(payload.clone())),
        );

        let error = StreamError::Transport(TransportError::Http { status: 502 });
        dispatcher.dispatch_error(&key, &error);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["channel"], "conversation:c9");
        assert!(seen[0]["error"].as_str().unwrap().contains("502"));
    }

    #[test]
    fn open_event_reaches_reserved_subscribers() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let key = Channel::global().key();

        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        registry.subscribe(
            &key,
            OPEN_EVENT,
            Arc::new(move |_, _, _| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch_open(&key);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
