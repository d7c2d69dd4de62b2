//! The four-phase step protocol: resolve, execute, wait, normalize.
//!
//! This is the only place terminal outcomes are logged. Every operation
//! produces exactly one line, whichever strategies ran.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use stepwise_adapters::protocol;
use stepwise_adapters::{DebugSession, ProtocolError, StackFrame};
use stepwise_events::EventHub;
use stepwise_models::{ExecutionContextId, Outcome, StepRequest};

use crate::error::StepError;
use crate::strategies::StrategySet;
use crate::wait::WaitResult;

/// Runs one step operation and returns its normalized outcome.
///
/// Never fails: resolver and executor errors become `Outcome::Error`.
pub async fn execute_step_operation(
    session: &dyn DebugSession,
    hub: &EventHub,
    request: &StepRequest,
    strategies: &StrategySet,
) -> Outcome {
    let operation = request.command().operation_name();
    let outcome = run_step(session, hub, request, strategies).await;
    log_outcome(operation, session.id().as_str(), session.adapter_family(), &outcome);
    outcome
}

/// Waits for the next stop or termination without issuing any request.
pub async fn wait_for_outcome(
    session: &dyn DebugSession,
    hub: &EventHub,
    strategies: &StrategySet,
    operation: &str,
    contexts: &[ExecutionContextId],
    timeout: Duration,
) -> Outcome {
    let outcome = if session_ended(session, hub) {
        ended(session, hub)
    } else {
        let deadline = Instant::now() + timeout;
        let bounded = tokio::time::timeout_at(deadline, async {
            let result = strategies
                .wait
                .wait(session, hub, contexts, || async { Ok(()) }, timeout)
                .await;
            normalize(session, hub, contexts, result, timeout).await
        })
        .await;
        bounded.unwrap_or_else(|_| timed_out(timeout))
    };

    log_outcome(operation, session.id().as_str(), session.adapter_family(), &outcome);
    outcome
}

async fn run_step(
    session: &dyn DebugSession,
    hub: &EventHub,
    request: &StepRequest,
    strategies: &StrategySet,
) -> Outcome {
    // Stepping an ended session reports the end again, never an error.
    if session_ended(session, hub) {
        return ended(session, hub);
    }

    // One deadline covers resolution, the wait and the location lookup.
    let timeout = request.timeout();
    let deadline = Instant::now() + timeout;
    let bounded = tokio::time::timeout_at(deadline, async {
        let contexts = match strategies.resolver.resolve(session, hub, request).await {
            Ok(contexts) => contexts,
            Err(_) if session_ended(session, hub) => return ended(session, hub),
            Err(e) => return e.into_outcome(),
        };

        debug!(
            session_id = %session.id(),
            command = %request.command(),
            ?contexts,
            timeout_ms = timeout.as_millis() as u64,
            "executing step"
        );

        let command = request.command();
        let trigger = || strategies.executor.execute(session, command, &contexts);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let result = strategies
            .wait
            .wait(session, hub, &contexts, trigger, remaining)
            .await;

        normalize(session, hub, &contexts, result, timeout).await
    })
    .await;

    bounded.unwrap_or_else(|_| timed_out(timeout))
}

fn session_ended(session: &dyn DebugSession, hub: &EventHub) -> bool {
    hub.is_terminated(session.id()) || !session.is_active()
}

fn ended(session: &dyn DebugSession, hub: &EventHub) -> Outcome {
    Outcome::Terminated {
        exit_code: hub.exit_code(session.id()),
    }
}

async fn normalize(
    session: &dyn DebugSession,
    hub: &EventHub,
    contexts: &[ExecutionContextId],
    result: WaitResult,
    timeout: Duration,
) -> Outcome {
    match result {
        WaitResult::Stopped { context, frame, .. } => {
            let context = context.or_else(|| contexts.first().copied());
            match locate(session, context, frame).await {
                Ok(frame) => stopped_at(&frame, context),
                Err(e) if e.indicates_session_end() => ended(session, hub),
                Err(e) => StepError::from(e).into_outcome(),
            }
        }
        WaitResult::Terminated { exit_code } => Outcome::Terminated { exit_code },
        WaitResult::TimedOut => timed_out(timeout),
        WaitResult::Failed(e) => e.into_outcome(),
    }
}

/// Top frame of the stopped context, fetched when the wait did not carry it.
async fn locate(
    session: &dyn DebugSession,
    context: Option<ExecutionContextId>,
    frame: Option<StackFrame>,
) -> Result<StackFrame, ProtocolError> {
    if let Some(frame) = frame {
        return Ok(frame);
    }

    let Some(context) = context else {
        return Err(ProtocolError::rejected("stackTrace", "stop reported no thread"));
    };

    protocol::top_frame(session, context).await?.ok_or_else(|| {
        ProtocolError::rejected("stackTrace", "no stack frames available after step")
    })
}

fn timed_out(timeout: Duration) -> Outcome {
    Outcome::TimedOut {
        timeout_ms: timeout.as_millis() as u64,
    }
}

/// Clamps an adapter position to a 1-based `u32`.
fn position(value: i64) -> u32 {
    u32::try_from(value.max(1)).unwrap_or(u32::MAX)
}

fn stopped_at(frame: &StackFrame, context: Option<ExecutionContextId>) -> Outcome {
    Outcome::Stopped {
        file: frame.display_path().to_string(),
        line: position(frame.line),
        column: position(frame.column),
        function_name: (!frame.name.is_empty()).then(|| frame.name.clone()),
        thread_id: context.map(|c| c.get()),
    }
}

/// `file:line`, plus `:column` when the adapter reports a real column.
fn format_location(file: &str, line: u32, column: u32) -> String {
    if column > 1 {
        format!("{}:{}:{}", file, line, column)
    } else {
        format!("{}:{}", file, line)
    }
}

/// Emits the single log line for a terminal outcome.
pub(crate) fn log_outcome(operation: &str, session_id: &str, family: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Stopped {
            file, line, column, ..
        } => {
            let location = format_location(file, *line, *column);
            info!(session_id, family, "[{}] Stepped to {}", operation, location);
        }
        Outcome::Terminated { exit_code: Some(code) } => {
            info!(session_id, family, "[{}] Program exited with code {}", operation, code);
        }
        Outcome::Terminated { exit_code: None } => {
            info!(session_id, family, "[{}] Program exited", operation);
        }
        Outcome::TimedOut { timeout_ms } => {
            warn!(session_id, family, "[{}] Timed out after {}ms", operation, timeout_ms);
        }
        Outcome::Error {
            code,
            message,
            hint,
        } => match hint {
            Some(hint) => warn!(
                session_id,
                family,
                "[{}] Error: [{}] {}. Hint: {}",
                operation,
                code,
                message,
                hint
            ),
            None => warn!(session_id, family, "[{}] Error: [{}] {}", operation, code, message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use stepwise_adapters::{EventFeed, EventListener, ScriptedSession};
    use stepwise_models::{DapEvent, ErrorCode, SessionId, StepCommand, StepRequestBuilder};

    use crate::config::StepConfig;
    use crate::strategies::StrategyTable;

    fn single() -> StrategySet {
        StrategyTable::default().get("single-thread").unwrap()
    }

    /// Single-thread session that stops at `src/a.ts:10:3` after each step.
    fn stepping_session() -> ScriptedSession {
        ScriptedSession::new("s1", "single-thread").with_handler(|req, events| {
            match req.command.as_str() {
                "threads" => Ok(json!({"threads": [{"id": 1, "name": "main"}]})),
                "stackTrace" => Ok(json!({"stackFrames": [
                    {"id": 1, "name": "handler", "source": {"path": "src/a.ts"}, "line": 10, "column": 3}
                ]})),
                "next" | "stepIn" | "stepOut" | "continue" => {
                    events.emit(DapEvent::stopped(1, "step"));
                    Ok(json!({}))
                }
                _ => Ok(json!({})),
            }
        })
    }

    /// Delegates to a scripted session but never answers `stackTrace`.
    struct StalledStackTrace(ScriptedSession);

    #[async_trait]
    impl DebugSession for StalledStackTrace {
        fn id(&self) -> &SessionId {
            self.0.id()
        }

        fn adapter_family(&self) -> &str {
            self.0.adapter_family()
        }

        async fn send_request(&self, command: &str, args: Value) -> Result<Value, ProtocolError> {
            if command == "stackTrace" {
                return std::future::pending().await;
            }
            self.0.send_request(command, args).await
        }

        fn on_event(&self, listener: EventListener) -> EventFeed {
            self.0.on_event(listener)
        }

        fn is_active(&self) -> bool {
            self.0.is_active()
        }
    }

    #[test]
    fn test_format_location() {
        assert_eq!(format_location("src/a.ts", 10, 3), "src/a.ts:10:3");
        assert_eq!(format_location("main.py", 4, 1), "main.py:4");
    }

    #[test]
    fn test_position_saturates() {
        assert_eq!(position(-4), 1);
        assert_eq!(position(0), 1);
        assert_eq!(position(42), 42);
        assert_eq!(position(i64::from(u32::MAX) + 10), u32::MAX);
    }

    #[test]
    fn test_stopped_at_clamps_and_names() {
        let frame = StackFrame {
            id: 1,
            name: String::new(),
            source: None,
            line: 0,
            column: 0,
        };
        assert_eq!(
            stopped_at(&frame, None),
            Outcome::Stopped {
                file: "unknown".into(),
                line: 1,
                column: 1,
                function_name: None,
                thread_id: None,
            }
        );
    }

    #[tokio::test]
    async fn test_step_normalizes_location() {
        let session = stepping_session();
        let hub = EventHub::new();
        let _feed = hub.attach(&session);
        let request = StepRequestBuilder::new("s1", StepCommand::Next).build();

        let outcome = execute_step_operation(&session, &hub, &request, &single()).await;

        assert_eq!(
            outcome,
            Outcome::Stopped {
                file: "src/a.ts".into(),
                line: 10,
                column: 3,
                function_name: Some("handler".into()),
                thread_id: Some(1),
            }
        );
        assert_eq!(session.requests_for("next").len(), 1);
    }

    #[tokio::test]
    async fn test_terminated_session_short_circuits() {
        let session = stepping_session();
        let hub = EventHub::new();
        let _feed = hub.attach(&session);
        session.emit(DapEvent::exited(0));
        session.emit(DapEvent::terminated());

        let request = StepRequestBuilder::new("s1", StepCommand::Continue).build();
        let outcome = execute_step_operation(&session, &hub, &request, &single()).await;

        assert_eq!(outcome, Outcome::Terminated { exit_code: Some(0) });
        assert!(session.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_step_is_error_outcome() {
        let session = ScriptedSession::new("s1", "single-thread").with_handler(|req, _| {
            match req.command.as_str() {
                "threads" => Ok(json!({"threads": [{"id": 1, "name": "main"}]})),
                _ => Err(ProtocolError::rejected(&req.command, "Thread is not paused")),
            }
        });
        let hub = EventHub::new();
        let request = StepRequestBuilder::new("s1", StepCommand::StepOut).build();

        let outcome = execute_step_operation(&session, &hub, &request, &single()).await;

        assert_eq!(outcome.error_code(), Some(ErrorCode::OperationFailed));
        assert_eq!(hub.pending_count(session.id()), 0);
    }

    #[tokio::test]
    async fn test_multi_context_not_found() {
        let session = ScriptedSession::new("s1", "multi-context").with_handler(|req, _| {
            match req.command.as_str() {
                "threads" => Ok(json!({"threads": [{"id": 1, "name": "main"}, {"id": 2, "name": "bg"}]})),
                _ => Err(ProtocolError::rejected(&req.command, "Isolate is not paused")),
            }
        });
        let hub = EventHub::new();
        let strategies = StrategyTable::new(&StepConfig::default())
            .get("multi-context")
            .unwrap();
        let request = StepRequestBuilder::new("s1", StepCommand::Next).build();

        let outcome = execute_step_operation(&session, &hub, &request, &strategies).await;

        assert_eq!(outcome.error_code(), Some(ErrorCode::NotFound));
        assert!(session.requests_for("next").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_outcome() {
        let session = ScriptedSession::new("s1", "single-thread");
        let hub = EventHub::new();
        let request = StepRequestBuilder::new("s1", StepCommand::Next)
            .context(ExecutionContextId::new(1))
            .timeout_ms(50)
            .build();

        let outcome = execute_step_operation(&session, &hub, &request, &single()).await;

        assert_eq!(outcome, Outcome::TimedOut { timeout_ms: 50 });
        assert_eq!(outcome.error_code(), Some(ErrorCode::Timeout));
    }

    #[tokio::test]
    async fn test_wait_for_outcome_without_request() {
        let session = stepping_session();
        let hub = EventHub::new();
        let _feed = hub.attach(&session);

        let emitter = session.emitter();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            emitter.emit(DapEvent::stopped(1, "breakpoint"));
        });

        let outcome = wait_for_outcome(
            &session,
            &hub,
            &single(),
            "debug.wait-for-hit",
            &[],
            Duration::from_secs(2),
        )
        .await;

        assert!(outcome.is_stopped());
        assert!(session.requests_for("continue").is_empty());
        assert_eq!(session.requests_for("stackTrace").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_location_lookup_times_out() {
        let session = StalledStackTrace(stepping_session());
        let hub = EventHub::new();
        let _feed = hub.attach(&session);
        let request = StepRequestBuilder::new("s1", StepCommand::Next)
            .timeout_ms(50)
            .build();

        let started = tokio::time::Instant::now();
        let outcome = execute_step_operation(&session, &hub, &request, &single()).await;

        assert_eq!(outcome, Outcome::TimedOut { timeout_ms: 50 });
        assert!(started.elapsed() <= Duration::from_millis(60));
        assert_eq!(session.0.requests_for("next").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_resolution_times_out() {
        let session = StalledStackTrace(
            ScriptedSession::new("s1", "multi-context").with_handler(|req, _| {
                match req.command.as_str() {
                    "threads" => Ok(json!({"threads": [{"id": 1, "name": "main"}]})),
                    _ => Ok(json!({})),
                }
            }),
        );
        let hub = EventHub::new();
        let strategies = StrategyTable::default().get("multi-context").unwrap();
        let request = StepRequestBuilder::new("s1", StepCommand::StepIn)
            .timeout_ms(40)
            .build();

        let outcome = execute_step_operation(&session, &hub, &request, &strategies).await;

        assert_eq!(outcome, Outcome::TimedOut { timeout_ms: 40 });
        assert!(session.0.requests_for("stepIn").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_outcome_bounds_location_lookup() {
        let session = StalledStackTrace(stepping_session());
        let hub = EventHub::new();
        let _feed = hub.attach(&session);

        let emitter = session.0.emitter();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            emitter.emit(DapEvent::stopped(1, "breakpoint"));
        });

        let outcome = wait_for_outcome(
            &session,
            &hub,
            &single(),
            "debug.wait-for-hit",
            &[],
            Duration::from_millis(30),
        )
        .await;

        assert_eq!(outcome, Outcome::TimedOut { timeout_ms: 30 });
    }
}
