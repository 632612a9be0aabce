//! Connection ownership and lifecycle.
//!
//! [`ConnectionManager`] owns the only map from channel key to live
//! connection; every mutation goes through it, which is what upholds the
//! at-most-one-connection-per-key invariant globally. Each connection is
//! driven by a single background task implementing the reconnect state
//! machine.

mod channel;
mod core;

pub use core::{ConnectionManager, ManagerStats};
