//! Error types for event hub operations.

use thiserror::Error;

/// Errors that can occur while waiting on the event hub.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The session was disconnected before a matching event arrived.
    #[error("session disconnected: {0}")]
    Disconnected(String),

    /// The subscription already delivered its event.
    #[error("subscription already consumed")]
    Consumed,
}

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
