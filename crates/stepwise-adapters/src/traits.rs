//! Core traits for debug sessions.
//!
//! The `DebugSession` trait is the only way the step runtime talks to a
//! debug adapter. Whatever owns the real connection (an editor API, a wire
//! client, a test script) implements it; the runtime never creates or
//! destroys sessions itself.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use stepwise_models::{DapEvent, SessionId};

use crate::patterns;

/// Errors returned by protocol requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The adapter answered with an error response.
    #[error("{command} rejected: {message}")]
    Rejected {
        /// Request that was rejected.
        command: String,
        /// Adapter-supplied message.
        message: String,
    },

    /// The connection to the adapter is gone.
    #[error("session disconnected: {0}")]
    Disconnected(String),

    /// The response body did not have the expected shape.
    #[error("malformed {command} response: {message}")]
    Malformed {
        /// Request whose response failed to parse.
        command: String,
        /// Parse failure.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a rejection for `command`.
    pub fn rejected(command: impl Into<String>, message: impl Into<String>) -> Self {
        ProtocolError::Rejected {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Returns true when the error means the debuggee or session has ended.
    pub fn indicates_session_end(&self) -> bool {
        match self {
            ProtocolError::Disconnected(_) => true,
            ProtocolError::Rejected { message, .. } => patterns::session_ended(message),
            ProtocolError::Malformed { .. } => false,
        }
    }

    /// Returns true when the adapter refused because the context is running.
    pub fn indicates_running(&self) -> bool {
        match self {
            ProtocolError::Rejected { message, .. } => patterns::not_paused(message),
            _ => false,
        }
    }
}

/// Callback receiving every event of one session.
pub type EventListener = Arc<dyn Fn(DapEvent) + Send + Sync>;

/// Disposable handle for an attached event listener.
///
/// Dropping it detaches the listener.
pub struct EventFeed {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl EventFeed {
    /// Creates a feed that runs `detach` when dropped.
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A feed with nothing to detach.
    pub fn noop() -> Self {
        Self { detach: None }
    }
}

impl fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFeed")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// A live connection to one debuggee.
///
/// # Example
///
/// ```ignore
/// use stepwise_adapters::DebugSession;
///
/// async fn pause(session: &dyn DebugSession) {
///     let _ = session
///         .send_request("pause", serde_json::json!({ "threadId": 1 }))
///         .await;
/// }
/// ```
#[async_trait]
pub trait DebugSession: Send + Sync {
    /// Session id, unique while the session is alive.
    fn id(&self) -> &SessionId;

    /// Adapter family tag used for strategy selection.
    fn adapter_family(&self) -> &str;

    /// Raw adapter type (`dart`, `pwa-node`, ...), for diagnostics.
    fn session_type(&self) -> &str {
        self.adapter_family()
    }

    /// Sends a protocol request and returns the response body.
    async fn send_request(&self, command: &str, args: Value) -> Result<Value, ProtocolError>;

    /// Attaches a listener for all events of this session.
    fn on_event(&self, listener: EventListener) -> EventFeed;

    /// Returns false once the session has terminated or disconnected.
    fn is_active(&self) -> bool {
        true
    }
}
