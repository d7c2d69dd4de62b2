//! Polling wait strategy for adapters whose stop events are unreliable.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use stepwise_adapters::protocol;
use stepwise_adapters::{DebugSession, ProtocolError, StackFrame};
use stepwise_events::EventHub;
use stepwise_models::ExecutionContextId;

use crate::wait::WaitResult;

/// State observed by one poll.
enum Probe {
    Paused(ExecutionContextId, StackFrame),
    Ended,
    Running,
}

/// Runs `trigger`, then inspects the debuggee every `every` until a context
/// is paused at a source location, the session ends, or `timeout` elapses.
pub(crate) async fn poll_for_stop<F, Fut>(
    session: &dyn DebugSession,
    hub: &EventHub,
    trigger: F,
    timeout: Duration,
    every: Duration,
) -> WaitResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), ProtocolError>>,
{
    let polled = tokio::time::timeout(timeout, async {
        if let Err(e) = trigger().await {
            return WaitResult::from_trigger_error(session, hub, e);
        }

        debug!(
            session_id = %session.id(),
            poll_interval_ms = every.as_millis() as u64,
            "polling for stop"
        );

        // First poll after one interval so the adapter has started the step.
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if hub.is_terminated(session.id()) || !session.is_active() {
                return WaitResult::Terminated {
                    exit_code: hub.exit_code(session.id()),
                };
            }

            match probe(session).await {
                Probe::Paused(context, frame) => {
                    return WaitResult::Stopped {
                        context: Some(context),
                        frame: Some(frame),
                        reason: None,
                    }
                }
                Probe::Ended => {
                    return WaitResult::Terminated {
                        exit_code: hub.exit_code(session.id()),
                    }
                }
                Probe::Running => {}
            }
        }
    })
    .await;

    polled.unwrap_or(WaitResult::TimedOut)
}

async fn probe(session: &dyn DebugSession) -> Probe {
    let threads = match protocol::threads(session).await {
        Ok(threads) => threads,
        Err(e) if e.indicates_session_end() => return Probe::Ended,
        Err(e) => {
            trace!(session_id = %session.id(), error = %e, "threads not available yet");
            return Probe::Running;
        }
    };

    for thread in &threads {
        match protocol::top_frame(session, thread.context_id()).await {
            Ok(Some(frame)) if frame.has_source() => {
                return Probe::Paused(thread.context_id(), frame);
            }
            Ok(_) => {}
            Err(e) if e.indicates_session_end() => return Probe::Ended,
            Err(e) if e.indicates_running() => {
                trace!(session_id = %session.id(), thread = thread.id, "thread still running");
            }
            Err(e) => {
                debug!(
                    session_id = %session.id(),
                    thread = thread.id,
                    error = %e,
                    "stackTrace failed while polling"
                );
            }
        }
    }

    Probe::Running
}
