//! Normalized results of step operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes surfaced to automation callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No session matches the given or active id.
    #[serde(rename = "E_NO_SESSION")]
    NoSession,
    /// No execution context matched (nothing paused at a recognizable source).
    #[serde(rename = "E_NOT_FOUND")]
    NotFound,
    /// The adapter rejected the request.
    #[serde(rename = "E_OPERATION_FAILED")]
    OperationFailed,
    /// The wait exceeded its timeout.
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    /// Caller parameters were out of range.
    #[serde(rename = "E_INVALID_PARAMS")]
    InvalidParams,
    /// The session's adapter family has no strategy entry.
    #[serde(rename = "E_UNKNOWN_ADAPTER")]
    UnknownAdapter,
}

impl ErrorCode {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoSession => "E_NO_SESSION",
            ErrorCode::NotFound => "E_NOT_FOUND",
            ErrorCode::OperationFailed => "E_OPERATION_FAILED",
            ErrorCode::Timeout => "E_TIMEOUT",
            ErrorCode::InvalidParams => "E_INVALID_PARAMS",
            ErrorCode::UnknownAdapter => "E_UNKNOWN_ADAPTER",
        }
    }

    /// Actionable recovery hint for this code.
    pub fn default_hint(&self) -> &'static str {
        match self {
            ErrorCode::NoSession => {
                "Start a debug session, or pass the id of a session that is still running"
            }
            ErrorCode::NotFound => {
                "Pause at a breakpoint in your own source before stepping; no context was paused at a recognizable location"
            }
            ErrorCode::OperationFailed => {
                "Ensure the debugger is paused before stepping; the adapter refused the request"
            }
            ErrorCode::Timeout => {
                "The debuggee may still be running; query its state or retry with a larger timeoutMs"
            }
            ErrorCode::InvalidParams => "Check timeoutMs and sessionId against the accepted ranges",
            ErrorCode::UnknownAdapter => {
                "Register a strategy entry for this adapter family before stepping its sessions"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a step operation.
///
/// Exactly one is produced per operation. On the wire a timeout is an
/// `error` event with code `E_TIMEOUT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireOutcome", from = "WireOutcome")]
pub enum Outcome {
    /// The debuggee paused.
    Stopped {
        /// Source path, or source name when the adapter has no path.
        file: String,
        /// 1-based line.
        line: u32,
        /// 1-based column.
        column: u32,
        function_name: Option<String>,
        thread_id: Option<i64>,
    },
    /// The session ended.
    Terminated { exit_code: Option<i64> },
    /// Nothing conclusive happened within the timeout.
    TimedOut { timeout_ms: u64 },
    /// The operation failed.
    Error {
        code: ErrorCode,
        message: String,
        hint: Option<String>,
    },
}

/// Serialized form of [`Outcome`].
#[derive(Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum WireOutcome {
    #[serde(rename_all = "camelCase")]
    Stopped {
        file: String,
        line: u32,
        column: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Terminated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        code: ErrorCode,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl From<Outcome> for WireOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Stopped {
                file,
                line,
                column,
                function_name,
                thread_id,
            } => WireOutcome::Stopped {
                file,
                line,
                column,
                function_name,
                thread_id,
            },
            Outcome::Terminated { exit_code } => WireOutcome::Terminated { exit_code },
            Outcome::TimedOut { timeout_ms } => WireOutcome::Error {
                code: ErrorCode::Timeout,
                message: format!(
                    "Timed out after {}ms waiting for the debugger to stop",
                    timeout_ms
                ),
                hint: Some(ErrorCode::Timeout.default_hint().to_string()),
                timeout_ms: Some(timeout_ms),
            },
            Outcome::Error {
                code,
                message,
                hint,
            } => WireOutcome::Error {
                code,
                message,
                hint,
                timeout_ms: None,
            },
        }
    }
}

impl From<WireOutcome> for Outcome {
    fn from(wire: WireOutcome) -> Self {
        match wire {
            WireOutcome::Stopped {
                file,
                line,
                column,
                function_name,
                thread_id,
            } => Outcome::Stopped {
                file,
                line,
                column,
                function_name,
                thread_id,
            },
            WireOutcome::Terminated { exit_code } => Outcome::Terminated { exit_code },
            WireOutcome::Error {
                code: ErrorCode::Timeout,
                timeout_ms: Some(timeout_ms),
                ..
            } => Outcome::TimedOut { timeout_ms },
            WireOutcome::Error {
                code,
                message,
                hint,
                ..
            } => Outcome::Error {
                code,
                message,
                hint,
            },
        }
    }
}

impl Outcome {
    /// A stop at `file:line:column`.
    pub fn stopped(file: impl Into<String>, line: u32, column: u32) -> Self {
        Outcome::Stopped {
            file: file.into(),
            line,
            column,
            function_name: None,
            thread_id: None,
        }
    }

    /// A termination without exit code.
    pub fn terminated() -> Self {
        Outcome::Terminated { exit_code: None }
    }

    /// An error carrying the code's default hint.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Outcome::Error {
            code,
            message: message.into(),
            hint: Some(code.default_hint().to_string()),
        }
    }

    /// Wire event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Outcome::Stopped { .. } => "stopped",
            Outcome::Terminated { .. } => "terminated",
            Outcome::TimedOut { .. } | Outcome::Error { .. } => "error",
        }
    }

    /// Returns true if this is a stop.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Outcome::Stopped { .. })
    }

    /// Returns true if this is a termination.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Outcome::Terminated { .. })
    }

    /// Returns true if this is a timeout.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut { .. })
    }

    /// Error code, for error outcomes.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Outcome::Error { code, .. } => Some(*code),
            Outcome::TimedOut { .. } => Some(ErrorCode::Timeout),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stopped_wire_shape() {
        let outcome = Outcome::stopped("src/a.ts", 10, 3);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"event": "stopped", "file": "src/a.ts", "line": 10, "column": 3})
        );
    }

    #[test]
    fn test_stopped_optional_fields() {
        let outcome = Outcome::Stopped {
            file: "main.py".into(),
            line: 2,
            column: 1,
            function_name: Some("main".into()),
            thread_id: Some(1),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["functionName"], "main");
        assert_eq!(value["threadId"], 1);
    }

    #[test]
    fn test_terminated_wire_shape() {
        assert_eq!(
            serde_json::to_value(Outcome::terminated()).unwrap(),
            json!({"event": "terminated"})
        );
        assert_eq!(
            serde_json::to_value(Outcome::Terminated { exit_code: Some(0) }).unwrap(),
            json!({"event": "terminated", "exitCode": 0})
        );
    }

    #[test]
    fn test_error_wire_shape() {
        let outcome = Outcome::error(ErrorCode::NoSession, "no session");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["code"], "E_NO_SESSION");
        assert_eq!(value["message"], "no session");
        assert!(value["hint"].is_string());
    }

    #[test]
    fn test_timeout_wire_shape() {
        let outcome = Outcome::TimedOut { timeout_ms: 50 };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "event": "error",
                "code": "E_TIMEOUT",
                "message": "Timed out after 50ms waiting for the debugger to stop",
                "hint": ErrorCode::Timeout.default_hint(),
                "timeoutMs": 50
            })
        );
        assert_eq!(outcome.error_code(), Some(ErrorCode::Timeout));
        assert_eq!(outcome.event_name(), "error");
    }

    #[test]
    fn test_timeout_read_back() {
        let text = serde_json::to_string(&Outcome::TimedOut { timeout_ms: 75 }).unwrap();
        let parsed: Outcome = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, Outcome::TimedOut { timeout_ms: 75 });
    }

    #[test]
    fn test_every_outcome_uses_a_known_event() {
        for outcome in [
            Outcome::stopped("a.ts", 1, 1),
            Outcome::terminated(),
            Outcome::TimedOut { timeout_ms: 1 },
            Outcome::error(ErrorCode::NotFound, "nothing paused"),
        ] {
            let value = serde_json::to_value(&outcome).unwrap();
            let event = value["event"].as_str().unwrap();
            assert!(["stopped", "terminated", "error"].contains(&event), "{}", value);
            assert_eq!(event, outcome.event_name());
        }
    }

    #[test]
    fn test_round_trip_error() {
        let outcome = Outcome::error(ErrorCode::OperationFailed, "rejected");
        let text = serde_json::to_string(&outcome).unwrap();
        let parsed: Outcome = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn test_predicates() {
        assert!(Outcome::stopped("a", 1, 1).is_stopped());
        assert!(Outcome::terminated().is_terminated());
        assert!(Outcome::TimedOut { timeout_ms: 1 }.is_timed_out());
        assert_eq!(Outcome::terminated().error_code(), None);
        assert_eq!(Outcome::terminated().event_name(), "terminated");
    }

    #[test]
    fn test_every_code_has_hint() {
        for code in [
            ErrorCode::NoSession,
            ErrorCode::NotFound,
            ErrorCode::OperationFailed,
            ErrorCode::Timeout,
            ErrorCode::InvalidParams,
            ErrorCode::UnknownAdapter,
        ] {
            assert!(!code.default_hint().is_empty());
            assert!(code.as_str().starts_with("E_"));
        }
    }
}
