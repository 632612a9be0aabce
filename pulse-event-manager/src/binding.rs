//! Scoped channel acquisition.
//!
//! A [`Binding`] pairs a set of registered handlers with one reference on a
//! channel. Dropping it, on any exit path, unregisters the handlers and
//! releases the reference, so consumers cannot leak connections. Any UI
//! framework's mount/unmount hook becomes a thin adapter that creates and
//! drops a binding.

use std::sync::Arc;

use pulse_stream::{Channel, ChannelKey, EventHandler, SubscriptionId, SubscriptionRegistry};

use crate::error::Result;
use crate::manager::BindingManager;

/// A live claim on a channel: "keep this connected and route these events to
/// me while I exist."
pub struct Binding {
    manager: BindingManager,
    channel: Channel,
    key: ChannelKey,
    subscriptions: Vec<SubscriptionId>,
    enabled: bool,
}

impl Binding {
    pub(crate) fn new(
        manager: BindingManager,
        channel: Channel,
        handlers: Vec<(String, EventHandler)>,
    ) -> Result<Self> {
        let key = channel.key();
        let registry = Arc::clone(manager.connections().registry());

        // Handlers go in before the connection opens so the synthesized
        // "open" event is observed by this binding.
        let subscriptions = register_all(&registry, &key, handlers);

        if let Err(error) = manager.acquire(&channel) {
            for id in subscriptions {
                registry.unsubscribe(id);
            }
            return Err(error);
        }

        Ok(Self {
            manager,
            channel,
            key,
            subscriptions,
            enabled: true,
        })
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the binding.
    ///
    /// Disabling releases the channel reference (closing the connection when
    /// this was the last one) but keeps the handlers registered; re-enabling
    /// re-acquires. Useful for "only while a conversation is selected"
    /// consumers.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled == self.enabled {
            return Ok(());
        }

        if enabled {
            self.manager.acquire(&self.channel)?;
        } else {
            self.manager.release(&self.key);
        }

        self.enabled = enabled;
        Ok(())
    }

    /// Replace this binding's handler set.
    ///
    /// Goes through the subscription registry only; the connection is
    /// untouched, so no reconnect happens.
    pub fn update_handlers(&mut self, handlers: Vec<(String, EventHandler)>) {
        let registry = Arc::clone(self.manager.connections().registry());
        for id in self.subscriptions.drain(..) {
            registry.unsubscribe(id);
        }
        self.subscriptions = register_all(&registry, &self.key, handlers);
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        let registry = Arc::clone(self.manager.connections().registry());
        for id in self.subscriptions.drain(..) {
            registry.unsubscribe(id);
        }
        if self.enabled {
            self.manager.release(&self.key);
        }
    }
}

fn register_all(
    registry: &SubscriptionRegistry,
    key: &ChannelKey,
    handlers: Vec<(String, EventHandler)>,
) -> Vec<SubscriptionId> {
    handlers
        .into_iter()
        .map(|(event_type, handler)| registry.subscribe(key, &event_type, handler))
        .collect()
}
