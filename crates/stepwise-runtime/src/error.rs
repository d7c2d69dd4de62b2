//! Error types for the step runtime.

use thiserror::Error;

use stepwise_adapters::ProtocolError;
use stepwise_models::{ErrorCode, Outcome};

/// Errors that can occur during a step operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    /// No session matches the given or active id, or it has no contexts.
    #[error("no session: {0}")]
    NoSession(String),

    /// No execution context matched.
    #[error("no paused execution context found: {0}")]
    NotFound(String),

    /// The adapter rejected a request.
    #[error("{0}")]
    OperationFailed(String),

    /// Caller parameters were out of range.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// No strategy entry for the adapter family.
    #[error("unknown adapter family: {0}")]
    UnknownAdapter(String),
}

impl StepError {
    /// Taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            StepError::NoSession(_) => ErrorCode::NoSession,
            StepError::NotFound(_) => ErrorCode::NotFound,
            StepError::OperationFailed(_) => ErrorCode::OperationFailed,
            StepError::InvalidParams(_) => ErrorCode::InvalidParams,
            StepError::UnknownAdapter(_) => ErrorCode::UnknownAdapter,
        }
    }

    /// Recovery hint shown alongside the error.
    pub fn hint(&self) -> &'static str {
        self.code().default_hint()
    }

    /// Converts the error into an `Error` outcome.
    pub fn into_outcome(self) -> Outcome {
        Outcome::error(self.code(), self.to_string())
    }
}

impl From<ProtocolError> for StepError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Rejected { message, .. } => StepError::OperationFailed(message),
            other => StepError::OperationFailed(other.to_string()),
        }
    }
}

/// Result type for step runtime operations.
pub type Result<T> = std::result::Result<T, StepError>;
