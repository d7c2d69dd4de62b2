//! Execution context resolution.

use futures::future::join_all;
use tracing::{debug, trace};

use stepwise_adapters::protocol;
use stepwise_adapters::{DebugSession, ProtocolError};
use stepwise_events::EventHub;
use stepwise_models::{ExecutionContextId, StepRequest};

use crate::error::{Result, StepError};

/// Decides which execution contexts a step targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadResolver {
    /// Pausing halts the whole debuggee; there is one context to step.
    ///
    /// A `sentinel` is used as-is without asking the adapter.
    Single {
        sentinel: Option<ExecutionContextId>,
    },
    /// Several independent contexts; pick the one paused in user source.
    Multi,
}

impl ThreadResolver {
    /// Returns the non-empty, ordered set of contexts to step.
    ///
    /// Contexts pinned on the request are returned unchanged.
    pub async fn resolve(
        &self,
        session: &dyn DebugSession,
        hub: &EventHub,
        request: &StepRequest,
    ) -> Result<Vec<ExecutionContextId>> {
        if !request.context_ids().is_empty() {
            return Ok(request.context_ids().to_vec());
        }

        match self {
            ThreadResolver::Single { sentinel } => resolve_single(session, hub, *sentinel).await,
            ThreadResolver::Multi => resolve_multi(session, hub, request.source_hint()).await,
        }
    }
}

fn session_error(session: &dyn DebugSession, err: ProtocolError) -> StepError {
    if err.indicates_session_end() {
        StepError::NoSession(format!("{} ({})", session.id(), err))
    } else {
        err.into()
    }
}

async fn resolve_single(
    session: &dyn DebugSession,
    hub: &EventHub,
    sentinel: Option<ExecutionContextId>,
) -> Result<Vec<ExecutionContextId>> {
    if let Some(context) = sentinel {
        return Ok(vec![context]);
    }

    if let Some(context) = hub.last_stopped_context(session.id()) {
        trace!(session_id = %session.id(), context = %context, "using last stopped context");
        return Ok(vec![context]);
    }

    let threads = protocol::threads(session)
        .await
        .map_err(|e| session_error(session, e))?;

    threads
        .first()
        .map(|t| vec![t.context_id()])
        .ok_or_else(|| StepError::NoSession(format!("{} has no threads", session.id())))
}

async fn resolve_multi(
    session: &dyn DebugSession,
    hub: &EventHub,
    source_hint: Option<&str>,
) -> Result<Vec<ExecutionContextId>> {
    let threads = protocol::threads(session)
        .await
        .map_err(|e| session_error(session, e))?;

    if threads.is_empty() {
        return Err(StepError::NoSession(format!("{} has no threads", session.id())));
    }

    let probes = join_all(
        threads
            .iter()
            .map(|t| protocol::top_frame(session, t.context_id())),
    )
    .await;

    let mut candidates = Vec::new();
    for (thread, probe) in threads.iter().zip(probes) {
        match probe {
            Ok(Some(frame)) if frame.has_source() => {
                if source_hint.map_or(true, |hint| frame.matches_source(hint)) {
                    candidates.push(thread.context_id());
                }
            }
            Ok(_) => {}
            // Running contexts refuse stackTrace; only a dead session is fatal.
            Err(e) if e.indicates_session_end() => return Err(session_error(session, e)),
            Err(e) if e.indicates_running() => {
                trace!(session_id = %session.id(), thread = thread.id, "context running");
            }
            Err(e) => {
                debug!(
                    session_id = %session.id(),
                    thread = thread.id,
                    error = %e,
                    "context not inspectable"
                );
            }
        }
    }

    debug!(
        session_id = %session.id(),
        threads = threads.len(),
        candidates = candidates.len(),
        "resolved multi-context candidates"
    );

    match candidates.as_slice() {
        [] => Err(StepError::NotFound(match source_hint {
            Some(hint) => format!("no context of {} is paused in {}", session.id(), hint),
            None => format!("no context of {} is paused at a source location", session.id()),
        })),
        [only] => Ok(vec![*only]),
        [first, ..] => {
            let chosen = hub
                .most_recent_stop(session.id(), &candidates)
                .unwrap_or(*first);
            Ok(vec![chosen])
        }
    }
}
