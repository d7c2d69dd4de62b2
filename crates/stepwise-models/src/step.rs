//! Step commands and requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::ids::{ExecutionContextId, SessionId};

/// A stepping intent understood by every debug adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepCommand {
    /// Step over the current line.
    #[serde(rename = "next")]
    Next,
    /// Step into the call on the current line.
    #[serde(rename = "stepIn")]
    StepIn,
    /// Run until the current function returns.
    #[serde(rename = "stepOut")]
    StepOut,
    /// Resume until the next breakpoint or program exit.
    #[serde(rename = "continue")]
    Continue,
}

impl StepCommand {
    /// All supported commands.
    pub const ALL: [StepCommand; 4] = [
        StepCommand::Next,
        StepCommand::StepIn,
        StepCommand::StepOut,
        StepCommand::Continue,
    ];

    /// The protocol request name sent to the adapter.
    pub fn protocol_name(&self) -> &'static str {
        match self {
            StepCommand::Next => "next",
            StepCommand::StepIn => "stepIn",
            StepCommand::StepOut => "stepOut",
            StepCommand::Continue => "continue",
        }
    }

    /// Operation name used as the log prefix.
    pub fn operation_name(&self) -> &'static str {
        match self {
            StepCommand::Next => "debug.step-over",
            StepCommand::StepIn => "debug.step-into",
            StepCommand::StepOut => "debug.step-out",
            StepCommand::Continue => "debug.continue",
        }
    }

    /// Returns true for commands that may run for a long time.
    pub fn is_resume(&self) -> bool {
        matches!(self, StepCommand::Continue)
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol_name())
    }
}

impl FromStr for StepCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" | "step-over" | "stepOver" => Ok(StepCommand::Next),
            "stepIn" | "step-in" | "step-into" => Ok(StepCommand::StepIn),
            "stepOut" | "step-out" => Ok(StepCommand::StepOut),
            "continue" => Ok(StepCommand::Continue),
            other => Err(format!("unknown step command: {}", other)),
        }
    }
}

/// One step operation against one session.
///
/// Immutable once built; see [`crate::StepRequestBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRequest {
    pub(crate) session_id: SessionId,
    pub(crate) command: StepCommand,
    pub(crate) context_ids: Vec<ExecutionContextId>,
    pub(crate) timeout: Duration,
    pub(crate) source_hint: Option<String>,
}

impl StepRequest {
    /// Target session.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Command to issue.
    pub fn command(&self) -> StepCommand {
        self.command
    }

    /// Contexts chosen by the caller. Empty means "let the resolver decide".
    pub fn context_ids(&self) -> &[ExecutionContextId] {
        &self.context_ids
    }

    /// How long to wait for an outcome.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Source file the caller expects the paused context to be in.
    pub fn source_hint(&self) -> Option<&str> {
        self.source_hint.as_deref()
    }

    /// Returns a copy targeting the given resolved contexts.
    pub fn with_contexts(&self, context_ids: Vec<ExecutionContextId>) -> Self {
        Self {
            context_ids,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        let names: Vec<_> = StepCommand::ALL.iter().map(|c| c.protocol_name()).collect();
        assert_eq!(names, vec!["next", "stepIn", "stepOut", "continue"]);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("step-over".parse::<StepCommand>(), Ok(StepCommand::Next));
        assert_eq!("step-into".parse::<StepCommand>(), Ok(StepCommand::StepIn));
        assert_eq!("stepOut".parse::<StepCommand>(), Ok(StepCommand::StepOut));
        assert_eq!("continue".parse::<StepCommand>(), Ok(StepCommand::Continue));
        assert!("pause".parse::<StepCommand>().is_err());
    }

    #[test]
    fn test_serde_uses_protocol_names() {
        let json = serde_json::to_string(&StepCommand::StepIn).unwrap();
        assert_eq!(json, "\"stepIn\"");
        let parsed: StepCommand = serde_json::from_str("\"next\"").unwrap();
        assert_eq!(parsed, StepCommand::Next);
    }

    #[test]
    fn test_only_continue_is_resume() {
        assert!(StepCommand::Continue.is_resume());
        assert!(!StepCommand::Next.is_resume());
    }
}
