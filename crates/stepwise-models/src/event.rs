//! Asynchronous protocol events emitted by debug adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ExecutionContextId;

/// Coarse classification of a protocol event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DapEventKind {
    /// Execution paused (breakpoint, step, exception, pause).
    Stopped,
    /// Execution resumed.
    Continued,
    /// The debug session ended.
    Terminated,
    /// The debuggee process exited.
    Exited,
    /// Console or program output.
    Output,
    /// A thread started or exited.
    Thread,
    /// Anything else.
    Other,
}

impl DapEventKind {
    /// Classifies a raw event name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "stopped" => DapEventKind::Stopped,
            "continued" => DapEventKind::Continued,
            "terminated" => DapEventKind::Terminated,
            "exited" => DapEventKind::Exited,
            "output" => DapEventKind::Output,
            "thread" => DapEventKind::Thread,
            _ => DapEventKind::Other,
        }
    }

    /// Returns true for events after which the session cannot stop again.
    pub fn ends_session(&self) -> bool {
        matches!(self, DapEventKind::Terminated | DapEventKind::Exited)
    }
}

/// A protocol event as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DapEvent {
    /// Raw event name (`stopped`, `terminated`, ...).
    pub event: String,
    /// Event body, `Value::Null` when the adapter sent none.
    #[serde(default)]
    pub body: Value,
    /// When the event reached this process.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl DapEvent {
    /// Creates an event with the given name and body.
    pub fn new(event: impl Into<String>, body: Value) -> Self {
        Self {
            event: event.into(),
            body,
            received_at: Utc::now(),
        }
    }

    /// A `stopped` event for one context.
    pub fn stopped(thread_id: i64, reason: &str) -> Self {
        Self::new(
            "stopped",
            serde_json::json!({ "threadId": thread_id, "reason": reason }),
        )
    }

    /// A `terminated` event.
    pub fn terminated() -> Self {
        Self::new("terminated", Value::Null)
    }

    /// An `exited` event with the debuggee's exit code.
    pub fn exited(exit_code: i64) -> Self {
        Self::new("exited", serde_json::json!({ "exitCode": exit_code }))
    }

    /// Event classification.
    pub fn kind(&self) -> DapEventKind {
        DapEventKind::from_name(&self.event)
    }

    /// Thread id carried by stopped/continued/thread events.
    pub fn thread_id(&self) -> Option<ExecutionContextId> {
        self.body
            .get("threadId")
            .and_then(Value::as_i64)
            .map(ExecutionContextId::new)
    }

    /// True when the adapter reports that every thread paused.
    pub fn all_threads_stopped(&self) -> bool {
        self.body
            .get("allThreadsStopped")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Stop reason (`step`, `breakpoint`, ...).
    pub fn reason(&self) -> Option<&str> {
        self.body.get("reason").and_then(Value::as_str)
    }

    /// Exit code carried by `exited` events.
    pub fn exit_code(&self) -> Option<i64> {
        self.body.get("exitCode").and_then(Value::as_i64)
    }
}
