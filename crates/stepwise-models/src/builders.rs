//! Builder for step requests.

use std::time::Duration;

use crate::ids::{ExecutionContextId, SessionId};
use crate::step::{StepCommand, StepRequest};

/// Default wait for single-step commands.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default wait for `continue`.
pub const DEFAULT_CONTINUE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Builder for creating StepRequest instances with a fluent API.
#[derive(Debug, Clone)]
pub struct StepRequestBuilder {
    session_id: SessionId,
    command: StepCommand,
    context_ids: Vec<ExecutionContextId>,
    timeout: Option<Duration>,
    source_hint: Option<String>,
}

impl StepRequestBuilder {
    /// Creates a new builder with required fields.
    pub fn new(session_id: impl Into<SessionId>, command: StepCommand) -> Self {
        Self {
            session_id: session_id.into(),
            command,
            context_ids: Vec::new(),
            timeout: None,
            source_hint: None,
        }
    }

    /// Sets the wait timeout (defaults by command if not set).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the wait timeout in milliseconds.
    pub fn timeout_ms(self, timeout_ms: u64) -> Self {
        self.timeout(Duration::from_millis(timeout_ms))
    }

    /// Pins the request to a specific context.
    pub fn context(mut self, id: impl Into<ExecutionContextId>) -> Self {
        self.context_ids.push(id.into());
        self
    }

    /// Sets the source file the paused context is expected to be in.
    pub fn source_hint(mut self, path: impl Into<String>) -> Self {
        self.source_hint = Some(path.into());
        self
    }

    /// Builds the request.
    pub fn build(self) -> StepRequest {
        let timeout = self.timeout.unwrap_or(if self.command.is_resume() {
            DEFAULT_CONTINUE_TIMEOUT
        } else {
            DEFAULT_STEP_TIMEOUT
        });

        StepRequest {
            session_id: self.session_id,
            command: self.command,
            context_ids: self.context_ids,
            timeout,
            source_hint: self.source_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_minimal() {
        let request = StepRequestBuilder::new("s1", StepCommand::Next).build();

        assert_eq!(request.session_id().as_str(), "s1");
        assert_eq!(request.command(), StepCommand::Next);
        assert!(request.context_ids().is_empty());
        assert_eq!(request.timeout(), DEFAULT_STEP_TIMEOUT);
        assert!(request.source_hint().is_none());
    }

    #[test]
    fn test_continue_defaults_larger() {
        let request = StepRequestBuilder::new("s1", StepCommand::Continue).build();
        assert_eq!(request.timeout(), DEFAULT_CONTINUE_TIMEOUT);
        assert!(request.timeout() > DEFAULT_STEP_TIMEOUT);
    }

    #[test]
    fn test_builder_full() {
        let request = StepRequestBuilder::new("s1", StepCommand::StepOut)
            .timeout_ms(250)
            .context(ExecutionContextId::new(3))
            .context(ExecutionContextId::new(4))
            .source_hint("lib/main.dart")
            .build();

        assert_eq!(request.timeout(), Duration::from_millis(250));
        assert_eq!(
            request.context_ids(),
            &[ExecutionContextId::new(3), ExecutionContextId::new(4)]
        );
        assert_eq!(request.source_hint(), Some("lib/main.dart"));
    }

    #[test]
    fn test_with_contexts_keeps_other_fields() {
        let request = StepRequestBuilder::new("s1", StepCommand::StepIn)
            .timeout_ms(90)
            .build();
        let resolved = request.with_contexts(vec![ExecutionContextId::new(9)]);

        assert_eq!(resolved.timeout(), Duration::from_millis(90));
        assert_eq!(resolved.command(), StepCommand::StepIn);
        assert_eq!(resolved.context_ids(), &[ExecutionContextId::new(9)]);
    }
}
