//! # Pulse Event Manager
//!
//! Reference-counted channel bindings over the pulse-stream connection layer.
//!
//! ## Overview
//!
//! UI components and cache layers declare what they need ("while I am
//! active, keep channel C open and route these events to me") and this crate
//! turns those declarations into connection lifecycle. Each [`Binding`] is a
//! scoped acquisition: creating it registers the handlers and takes a
//! reference on the channel, dropping it releases both, and the underlying
//! connection is only torn down when the last reference goes away.
//!
//! ## Key properties
//!
//! - **Demand-driven connections**: a channel is opened on the first binding
//!   that needs it, never earlier
//! - **Reference counting**: overlapping consumers of one channel share a
//!   single connection
//! - **Release on every exit path**: `Drop` is the release, so an early
//!   return or a panic in the consumer cannot leak a connection
//! - **Connection-independent handler updates**: swapping a binding's
//!   handler set goes through the subscription registry and never forces a
//!   reconnect
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pulse_event_manager::prelude::*;
//! use pulse_stream::StaticToken;
//!
//! let manager = BindingManager::new(
//!     StreamConfig::new("https://api.example.com"),
//!     Arc::new(StaticToken::new("token")),
//! )?;
//!
//! let binding = manager.bind(
//!     Channel::conversation("abc123")?,
//!     vec![(
//!         "message.created".to_string(),
//!         Arc::new(|_, _, payload| println!("{payload}")) as EventHandler,
//!     )],
//! )?;
//!
//! // ... channel stays open while `binding` lives ...
//! drop(binding); // last reference: connection torn down
//! ```

pub mod binding;
pub mod error;
pub mod manager;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use binding::Binding;
pub use error::{BindingError, Result};
pub use manager::BindingManager;

// Re-export commonly used types from pulse-stream
pub use pulse_stream::{
    Channel, ChannelKey, ChannelType, ConnectionState, EventHandler, StreamConfig,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Binding, BindingError, BindingManager, Channel, ChannelKey, ChannelType, ConnectionState,
        EventHandler, Result, StreamConfig,
    };
}
