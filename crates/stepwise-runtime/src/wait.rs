//! Wait strategies: how the orchestrator learns that a step completed.
//!
//! Both strategies own the ordering between listening and triggering. The
//! event-driven strategy registers with the hub before it runs the trigger;
//! the polling strategy has nothing to miss and polls after it.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use stepwise_adapters::{DebugSession, ProtocolError, StackFrame};
use stepwise_events::{EventError, EventHub, EventPredicate};
use stepwise_models::{DapEvent, DapEventKind, ExecutionContextId};

use crate::error::StepError;
use crate::poller;

/// Raw result of a wait, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitResult {
    /// A context paused. `frame` is set when the strategy already knows
    /// where.
    Stopped {
        context: Option<ExecutionContextId>,
        frame: Option<StackFrame>,
        reason: Option<String>,
    },
    /// The session ended.
    Terminated { exit_code: Option<i64> },
    /// The timeout elapsed first.
    TimedOut,
    /// The trigger failed; nothing was awaited.
    Failed(StepError),
}

impl WaitResult {
    pub(crate) fn from_trigger_error(
        session: &dyn DebugSession,
        hub: &EventHub,
        err: ProtocolError,
    ) -> Self {
        if err.indicates_session_end() {
            debug!(session_id = %session.id(), error = %err, "trigger hit an ended session");
            WaitResult::Terminated {
                exit_code: hub.exit_code(session.id()),
            }
        } else {
            WaitResult::Failed(err.into())
        }
    }

    fn from_event(
        session: &dyn DebugSession,
        hub: &EventHub,
        contexts: &[ExecutionContextId],
        event: DapEvent,
    ) -> Self {
        match event.kind() {
            DapEventKind::Stopped => WaitResult::Stopped {
                context: event.thread_id().or_else(|| contexts.first().copied()),
                frame: None,
                reason: event.reason().map(str::to_string),
            },
            _ => WaitResult::Terminated {
                exit_code: event.exit_code().or_else(|| hub.exit_code(session.id())),
            },
        }
    }
}

/// How completion of a step is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Await a `stopped`/`terminated`/`exited` event delivered by the hub.
    EventDriven,
    /// Inspect the debuggee every `interval` until it is paused or gone.
    Polling { interval: Duration },
}

impl WaitStrategy {
    /// Runs `trigger` and waits for its outcome, bounded by `timeout`.
    ///
    /// The bound covers the trigger too, so a stuck adapter still yields
    /// [`WaitResult::TimedOut`].
    pub async fn wait<F, Fut>(
        &self,
        session: &dyn DebugSession,
        hub: &EventHub,
        contexts: &[ExecutionContextId],
        trigger: F,
        timeout: Duration,
    ) -> WaitResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ProtocolError>>,
    {
        match self {
            WaitStrategy::EventDriven => {
                wait_for_event(session, hub, contexts, trigger, timeout).await
            }
            WaitStrategy::Polling { interval } => {
                poller::poll_for_stop(session, hub, trigger, timeout, *interval).await
            }
        }
    }
}

async fn wait_for_event<F, Fut>(
    session: &dyn DebugSession,
    hub: &EventHub,
    contexts: &[ExecutionContextId],
    trigger: F,
    timeout: Duration,
) -> WaitResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), ProtocolError>>,
{
    // Register first: the adapter may report the stop before it acknowledges
    // the request.
    let mut subscription = hub.subscribe(session.id(), EventPredicate::outcome(contexts));

    if hub.is_terminated(session.id()) {
        return WaitResult::Terminated {
            exit_code: hub.exit_code(session.id()),
        };
    }

    let waited = tokio::time::timeout(timeout, async {
        if let Err(e) = trigger().await {
            return WaitResult::from_trigger_error(session, hub, e);
        }

        trace!(session_id = %session.id(), ?contexts, "trigger accepted, awaiting event");

        match subscription.recv().await {
            Ok(event) => WaitResult::from_event(session, hub, contexts, event),
            Err(EventError::Disconnected(_)) => WaitResult::Terminated {
                exit_code: None,
            },
            Err(e @ EventError::Consumed) => {
                WaitResult::Failed(StepError::OperationFailed(e.to_string()))
            }
        }
    })
    .await;

    waited.unwrap_or_else(|_| {
        debug!(
            session_id = %session.id(),
            timeout_ms = timeout.as_millis() as u64,
            "no outcome event before timeout"
        );
        WaitResult::TimedOut
    })
}
