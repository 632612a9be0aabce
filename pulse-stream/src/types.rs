//! Core types for the pulse-stream crate.

use std::sync::Arc;

use crate::error::{Result, StreamError};

/// Logical stream endpoints that can be subscribed to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ChannelType {
    /// Account-wide events, no resource scope
    Global,
    /// Events scoped to a single workspace
    Workspace,
    /// Events scoped to a single conversation
    Conversation,
}

impl ChannelType {
    /// Path segment used when building the stream endpoint URL.
    pub fn segment(&self) -> &'static str {
        match self {
            ChannelType::Global => "global",
            ChannelType::Workspace => "workspace",
            ChannelType::Conversation => "conversation",
        }
    }

    /// Whether this channel type requires a resource identifier.
    pub fn requires_resource(&self) -> bool {
        !matches!(self, ChannelType::Global)
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segment())
    }
}

/// A logical stream endpoint: channel type plus optional resource scope.
///
/// Construction is the validation point: a `Workspace` or `Conversation`
/// channel cannot be built with an empty, `"undefined"`, or `"null"` resource
/// identifier, so a malformed channel can never reach the connection layer.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Channel {
    channel_type: ChannelType,
    resource_id: Option<String>,
}

impl Channel {
    /// The account-wide global channel.
    pub fn global() -> Self {
        Self {
            channel_type: ChannelType::Global,
            resource_id: None,
        }
    }

    /// A channel scoped to one workspace.
    pub fn workspace(id: impl Into<String>) -> Result<Self> {
        Self::new(ChannelType::Workspace, Some(id.into()))
    }

    /// A channel scoped to one conversation.
    pub fn conversation(id: impl Into<String>) -> Result<Self> {
        Self::new(ChannelType::Conversation, Some(id.into()))
    }

    /// Create a channel, validating the resource identifier.
    ///
    /// The resource identifier is ignored for `Global` channels. For scoped
    /// channel types it must be present and must not be empty, `"undefined"`,
    /// or `"null"`; stringified absent values from upstream callers are a
    /// known way to end up subscribed to a broken endpoint.
    pub fn new(channel_type: ChannelType, resource_id: Option<String>) -> Result<Self> {
        if !channel_type.requires_resource() {
            return Ok(Self {
                channel_type,
                resource_id: None,
            });
        }

        match resource_id {
            Some(id) if is_valid_resource_id(&id) => Ok(Self {
                channel_type,
                resource_id: Some(id),
            }),
            other => Err(StreamError::InvalidResource {
                channel_type,
                id: other.unwrap_or_default(),
            }),
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// Derive the unique key for this channel.
    pub fn key(&self) -> ChannelKey {
        match &self.resource_id {
            Some(id) => ChannelKey(format!("{}:{}", self.channel_type.segment(), id)),
            None => ChannelKey(self.channel_type.segment().to_string()),
        }
    }
}

fn is_valid_resource_id(id: &str) -> bool {
    !id.trim().is_empty() && id != "undefined" && id != "null"
}

/// Unique key identifying one channel: `"global"` or `"{type}:{resource_id}"`.
///
/// At most one live connection exists per key; the connection manager owns
/// the only map keyed by it.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a channel connection.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ConnectionState {
    /// No connection and none pending
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Stream open and delivering events
    Connected,
    /// Stream lost; a retry is scheduled
    Erroring,
    /// Retry attempts exhausted; waiting for a manual reconnect or a
    /// network-online signal
    Exhausted,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Erroring => "erroring",
            ConnectionState::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback invoked on every connection state change.
pub type StatusListener = Arc<dyn Fn(&ChannelKey, ConnectionState) + Send + Sync>;
