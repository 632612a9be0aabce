//! # pulse-stream
//!
//! Channel connection management and event delivery over server-sent event
//! streams.
//!
//! The crate keeps a client synchronized with server-pushed events on
//! long-lived one-way streams, multiplexed across logical channels (`global`,
//! `workspace:{id}`, `conversation:{id}`). It owns the connection lifecycle
//! (lazy open, exponential-backoff reconnect with a retry cap, network
//! online/offline coordination, deterministic teardown) and routes each
//! inbound frame to the handlers registered for its channel and event type.
//!
//! The pieces compose bottom-up: a pure [`BackoffPolicy`], an incremental
//! [`FrameDecoder`] for the wire format, a connection-state-independent
//! [`SubscriptionRegistry`], an [`EventDispatcher`] that isolates handler
//! failures, and a [`ConnectionManager`] owning one state-machine task per
//! channel. Auth is pulled through a [`TokenProvider`] on every attempt; the
//! wire is reached through the [`EventTransport`] seam so tests can script
//! it.

pub mod backoff;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod registry;
pub mod sse;
pub mod token;
pub mod transport;
pub mod types;

pub use backoff::BackoffPolicy;
pub use config::StreamConfig;
pub use dispatch::{EventDispatcher, ERROR_EVENT, OPEN_EVENT};
pub use error::{Result, StreamError, TransportError, TransportResult};
pub use manager::{ConnectionManager, ManagerStats};
pub use registry::{EventHandler, SubscriptionId, SubscriptionRegistry};
pub use sse::{FrameDecoder, SseFrame};
pub use token::{StaticToken, TokenProvider};
pub use transport::{EventTransport, FrameStream, SseTransport};
pub use types::{Channel, ChannelKey, ChannelType, ConnectionState, StatusListener};
