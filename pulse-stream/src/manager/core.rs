//! Core ConnectionManager implementation.
//!
//! The manager is the single owner of the channel-key → connection map and
//! the only component allowed to mutate it. It exposes connect/disconnect,
//! network online/offline coordination, handler registration, and state
//! introspection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::backoff::BackoffPolicy;
use crate::config::StreamConfig;
use crate::dispatch::EventDispatcher;
use crate::error::{Result, StreamError};
use crate::registry::{EventHandler, SubscriptionId, SubscriptionRegistry};
use crate::token::TokenProvider;
use crate::transport::{EventTransport, SseTransport};
use crate::types::{Channel, ChannelKey, ConnectionState, StatusListener};

use super::channel::ChannelConnection;

/// Manages every live channel connection.
///
/// Construct one per process (or per authenticated session) and share it via
/// `Arc`; there is deliberately no global instance. All methods are callable
/// from any task; `connect` must run inside a tokio runtime because it spawns
/// the connection task.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use pulse_stream::{Channel, ConnectionManager, StaticToken, StreamConfig};
///
/// let manager = ConnectionManager::new(
///     StreamConfig::new("https://api.example.com"),
///     Arc::new(StaticToken::new("token")),
/// )?;
///
/// let channel = Channel::conversation("abc123")?;
/// let key = channel.key();
/// manager.subscribe(&key, "message.created", Arc::new(|_, _, payload| {
///     println!("{payload}");
/// }));
/// manager.connect(channel)?;
/// ```
pub struct ConnectionManager {
    config: StreamConfig,
    backoff: BackoffPolicy,
    transport: Arc<dyn EventTransport>,
    tokens: Arc<dyn TokenProvider>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: EventDispatcher,
    status: Arc<RwLock<Option<StatusListener>>>,
    connections: Mutex<HashMap<ChannelKey, ChannelConnection>>,
    online_tx: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Create a manager using the HTTP SSE transport.
    pub fn new(config: StreamConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let transport = Arc::new(SseTransport::new(&config)?);
        Self::with_transport(config, tokens, transport)
    }

    /// Create a manager with a custom transport (used by tests).
    pub fn with_transport(
        config: StreamConfig,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn EventTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = EventDispatcher::new(Arc::clone(&registry));
        let backoff = BackoffPolicy {
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        };
        let (online_tx, _) = watch::channel(true);

        Ok(Self {
            config,
            backoff,
            transport,
            tokens,
            registry,
            dispatcher,
            status: Arc::new(RwLock::new(None)),
            connections: Mutex::new(HashMap::new()),
            online_tx,
        })
    }

    /// The shared handler registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Register a handler for `(key, event_type)`.
    pub fn subscribe(
        &self,
        key: &ChannelKey,
        event_type: &str,
        handler: EventHandler,
    ) -> SubscriptionId {
        self.registry.subscribe(key, event_type, handler)
    }

    /// Remove one handler registration.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.unsubscribe(id);
    }

    /// Install the sink notified on every connection state change.
    pub fn set_status_listener(&self, listener: StatusListener) {
        *self.status.write() = Some(listener);
    }

    pub fn clear_status_listener(&self) {
        *self.status.write() = None;
    }

    /// Open a connection for `channel`, or reuse the live one.
    ///
    /// Idempotent per key: an existing connection in `Connecting` or
    /// `Connected` is returned as-is. A stale entry (`Erroring`,
    /// `Exhausted`, `Disconnected`) is torn down first and replaced. Fails
    /// without creating any resource when no auth token is obtainable;
    /// that is a configuration error, not a retriable fault.
    pub fn connect(&self, channel: Channel) -> Result<ChannelKey> {
        let key = channel.key();
        let mut connections = self.connections.lock();

        if let Some(existing) = connections.get(&key) {
            match existing.state() {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    tracing::debug!(channel = %key, "reusing live connection");
                    return Ok(key);
                }
                _ => {
                    if let Some(stale) = connections.remove(&key) {
                        stale.shutdown();
                    }
                }
            }
        }

        let token = self
            .tokens
            .token()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StreamError::MissingToken(key.clone()))?;

        let connection = ChannelConnection::spawn(
            channel,
            self.config.clone(),
            self.backoff,
            Arc::clone(&self.transport),
            Arc::clone(&self.tokens),
            self.dispatcher.clone(),
            Arc::clone(&self.status),
            self.online_tx.subscribe(),
            token,
        );

        connections.insert(key.clone(), connection);
        tracing::info!(channel = %key, "channel connection opened");
        Ok(key)
    }

    /// Close the connection for `key`, cancelling any pending retry.
    ///
    /// Safe to call for a key with no connection.
    pub fn disconnect(&self, key: &ChannelKey) {
        let connection = self.connections.lock().remove(key);
        if let Some(connection) = connection {
            connection.shutdown();
            self.notify_status(key, ConnectionState::Disconnected);
            tracing::info!(channel = %key, "channel disconnected");
        }
    }

    /// Close every connection.
    pub fn disconnect_all(&self) {
        let connections: Vec<_> = self.connections.lock().drain().collect();
        for (key, connection) in connections {
            connection.shutdown();
            self.notify_status(&key, ConnectionState::Disconnected);
        }
    }

    /// Signal that network connectivity returned.
    ///
    /// Channels waiting out a backoff delay reconnect immediately; channels
    /// settled in `Exhausted` are re-armed.
    pub fn set_network_online(&self) {
        tracing::info!("network online; nudging waiting channels");
        self.online_tx.send_replace(true);
    }

    /// Signal that network connectivity was lost. Suspends all retry
    /// scheduling until the next online signal.
    pub fn set_network_offline(&self) {
        tracing::info!("network offline; suspending reconnection");
        self.online_tx.send_replace(false);
    }

    /// Current state for `key` (`Disconnected` when no connection exists).
    pub fn state(&self, key: &ChannelKey) -> ConnectionState {
        self.connections
            .lock()
            .get(key)
            .map(|connection| connection.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn is_connected(&self, key: &ChannelKey) -> bool {
        self.state(key) == ConnectionState::Connected
    }

    /// Failed-attempt count for `key`, zero when absent or healthy.
    pub fn attempts(&self, key: &ChannelKey) -> u32 {
        self.connections
            .lock()
            .get(key)
            .map(|connection| connection.shared().attempts())
            .unwrap_or(0)
    }

    /// When traffic last arrived on `key`.
    pub fn last_heartbeat(&self, key: &ChannelKey) -> Option<Instant> {
        self.connections
            .lock()
            .get(key)
            .and_then(|connection| connection.shared().last_heartbeat())
    }

    /// Snapshot of every connection's state.
    pub fn connection_states(&self) -> HashMap<ChannelKey, ConnectionState> {
        self.connections
            .lock()
            .iter()
            .map(|(key, connection)| (key.clone(), connection.state()))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Get statistics about current connections.
    pub fn stats(&self) -> ManagerStats {
        let connections = self.connections.lock();
        let mut state_breakdown = HashMap::new();
        for connection in connections.values() {
            *state_breakdown.entry(connection.state()).or_insert(0) += 1;
        }

        ManagerStats {
            total_connections: connections.len(),
            state_breakdown,
        }
    }

    /// Tear everything down. Called automatically on drop.
    pub fn shutdown(&self) {
        self.disconnect_all();
    }

    fn notify_status(&self, key: &ChannelKey, state: ConnectionState) {
        if let Some(listener) = &*self.status.read() {
            listener(key, state);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

/// Statistics about manager state.
#[derive(Debug, Clone)]
pub struct ManagerStats {
    pub total_connections: usize,
    pub state_breakdown: HashMap<ConnectionState, usize>,
}

impl std::fmt::Display for ManagerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Connection Stats:")?;
        writeln!(f, "  Total: {}", self.total_connections)?;
        writeln!(f, "  State breakdown:")?;
        for (state, count) in &self.state_breakdown {
            writeln!(f, "    {state}: {count}")?;
        }
        Ok(())
    }
}
