use thiserror::Error;

/// Errors that can occur in the binding layer.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The underlying channel connection could not be opened
    #[error("Failed to open channel: {0}")]
    Connect(#[from] pulse_stream::StreamError),
}

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, BindingError>;
