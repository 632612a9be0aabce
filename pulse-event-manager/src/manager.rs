//! Reference-counted binding manager.
//!
//! Tracks how many live bindings need each channel. The first acquisition of
//! a key opens the connection through the connection manager; the last
//! release closes it. The connection map itself stays owned by the
//! connection manager; this layer only counts demand and calls
//! `connect`/`disconnect`.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use pulse_stream::{
    Channel, ChannelKey, ConnectionManager, EventHandler, StreamConfig, TokenProvider,
};

use crate::binding::Binding;
use crate::error::Result;

/// Hands out reference-counted channel bindings.
///
/// Cheap to clone; clones share the same counts and connection manager.
#[derive(Clone)]
pub struct BindingManager {
    inner: Arc<Inner>,
}

struct Inner {
    connections: Arc<ConnectionManager>,
    ref_counts: DashMap<ChannelKey, usize>,
}

impl BindingManager {
    /// Create a manager with its own connection layer over the HTTP
    /// transport.
    pub fn new(config: StreamConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let connections = Arc::new(ConnectionManager::new(config, tokens)?);
        Ok(Self::with_connections(connections))
    }

    /// Wrap an existing connection manager.
    pub fn with_connections(connections: Arc<ConnectionManager>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connections,
                ref_counts: DashMap::new(),
            }),
        }
    }

    /// The underlying connection manager.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.inner.connections
    }

    /// Acquire a binding: register `handlers`, take a reference on the
    /// channel, and open the connection if this is the first reference.
    ///
    /// The binding releases everything when dropped.
    pub fn bind(
        &self,
        channel: Channel,
        handlers: Vec<(String, EventHandler)>,
    ) -> Result<Binding> {
        Binding::new(self.clone(), channel, handlers)
    }

    /// Increment the reference count for `channel`, connecting on 0 → 1.
    pub(crate) fn acquire(&self, channel: &Channel) -> Result<ChannelKey> {
        let key = channel.key();

        let was_zero = {
            let mut count = self.inner.ref_counts.entry(key.clone()).or_insert(0);
            let was_zero = *count == 0;
            *count += 1;
            tracing::debug!(channel = %key, refs = *count, "channel binding acquired");
            was_zero
        };

        if was_zero {
            if let Err(error) = self.inner.connections.connect(channel.clone()) {
                self.rollback_acquire(&key);
                return Err(error.into());
            }
        }

        Ok(key)
    }

    /// Decrement the reference count for `key`, disconnecting on 1 → 0.
    pub(crate) fn release(&self, key: &ChannelKey) {
        let should_disconnect = {
            match self.inner.ref_counts.get_mut(key) {
                Some(mut count) => {
                    *count = count.saturating_sub(1);
                    tracing::debug!(channel = %key, refs = *count, "channel binding released");
                    *count == 0
                }
                None => {
                    tracing::warn!(channel = %key, "release without matching acquisition");
                    false
                }
            }
        };

        if should_disconnect {
            self.inner.ref_counts.remove_if(key, |_, count| *count == 0);
            self.inner.connections.disconnect(key);
        }
    }

    fn rollback_acquire(&self, key: &ChannelKey) {
        if let Some(mut count) = self.inner.ref_counts.get_mut(key) {
            *count = count.saturating_sub(1);
        }
        self.inner.ref_counts.remove_if(key, |_, count| *count == 0);
    }

    /// Current reference count for `key`.
    pub fn ref_count(&self, key: &ChannelKey) -> usize {
        self.inner
            .ref_counts
            .get(key)
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Reference counts per channel key.
    pub fn stats(&self) -> HashMap<ChannelKey, usize> {
        self.inner
            .ref_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Tear down every connection regardless of reference counts.
    pub fn shutdown(&self) {
        self.inner.ref_counts.clear();
        self.inner.connections.disconnect_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pulse_stream::{Channel, ConnectionState, StreamError};

    use super::*;
    use crate::test_support::{binding_manager, settle, HangingTransport, NoToken};

    #[tokio::test(start_paused = true)]
    async fn first_acquisition_opens_the_connection() {
        let (manager, transport) = binding_manager();
        let channel = Channel::workspace("w1").unwrap();
        let key = channel.key();

        assert_eq!(manager.ref_count(&key), 0);

        manager.acquire(&channel).unwrap();
        settle().await;

        assert_eq!(manager.ref_count(&key), 1);
        assert_eq!(transport.attempts(), 1);
        assert_eq!(
            manager.connections().state(&key),
            ConnectionState::Connected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_acquisitions_share_one_connection() {
        let (manager, transport) = binding_manager();
        let channel = Channel::workspace("w1").unwrap();
        let key = channel.key();

        manager.acquire(&channel).unwrap();
        manager.acquire(&channel).unwrap();
        settle().await;

        assert_eq!(manager.ref_count(&key), 2);
        assert_eq!(transport.attempts(), 1);

        manager.release(&key);
        assert_eq!(manager.ref_count(&key), 1);
        assert_eq!(manager.connections().connection_count(), 1);

        manager.release(&key);
        assert_eq!(manager.ref_count(&key), 0);
        assert_eq!(manager.connections().connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn release_without_acquisition_is_harmless() {
        let (manager, _transport) = binding_manager();
        let key = Channel::workspace("w1").unwrap().key();

        manager.release(&key);
        assert_eq!(manager.ref_count(&key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_rolls_the_count_back() {
        let transport = HangingTransport::new();
        let connections = pulse_stream::ConnectionManager::with_transport(
            pulse_stream::StreamConfig::new("http://gateway.test"),
            Arc::new(NoToken),
            transport,
        )
        .unwrap();
        let manager = BindingManager::with_connections(Arc::new(connections));

        let channel = Channel::conversation("c1").unwrap();
        let key = channel.key();

        let result = manager.acquire(&channel);
        assert!(matches!(
            result,
            Err(crate::BindingError::Connect(StreamError::MissingToken(_)))
        ));
        assert_eq!(manager.ref_count(&key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_counts_per_key() {
        let (manager, _transport) = binding_manager();
        let w1 = Channel::workspace("w1").unwrap();
        let c1 = Channel::conversation("c1").unwrap();

        manager.acquire(&w1).unwrap();
        manager.acquire(&w1).unwrap();
        manager.acquire(&c1).unwrap();
        settle().await;

        let stats = manager.stats();
        assert_eq!(stats.get(&w1.key()), Some(&2));
        assert_eq!(stats.get(&c1.key()), Some(&1));
    }
}
