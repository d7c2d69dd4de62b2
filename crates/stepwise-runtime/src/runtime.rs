//! Step runtime façade: the per-command operations callers invoke.

use std::sync::Arc;

use tracing::debug;

use stepwise_adapters::protocol;
use stepwise_adapters::{DebugSession, Thread};
use stepwise_events::EventHub;
use stepwise_models::{
    ExecutionContextId, Outcome, SessionId, StepCommand, StepRequest, StepRequestBuilder,
};

use crate::config::StepConfig;
use crate::error::{Result, StepError};
use crate::orchestrator::{self, log_outcome};
use crate::sessions::SessionRegistry;
use crate::strategies::{StrategySet, StrategyTable};

/// Operation name for [`StepRuntime::wait_for_stop`].
pub const WAIT_FOR_STOP_OPERATION: &str = "debug.wait-for-hit";

/// Caller parameters shared by every step operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepParams {
    /// Target session; the active session when absent.
    pub session_id: Option<SessionId>,
    /// Wait bound; the command default when absent.
    pub timeout_ms: Option<u64>,
    /// Pins the step to one context instead of resolving it.
    pub context_id: Option<ExecutionContextId>,
    /// Source file the paused context is expected to be in.
    pub source_hint: Option<String>,
}

impl StepParams {
    /// Creates empty params (active session, default timeout).
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets a specific session.
    pub fn with_session(mut self, id: impl Into<SessionId>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Sets the wait bound.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Pins the context to step.
    pub fn with_context(mut self, id: impl Into<ExecutionContextId>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    /// Sets the expected source file.
    pub fn with_source_hint(mut self, path: impl Into<String>) -> Self {
        self.source_hint = Some(path.into());
        self
    }
}

/// Entry point combining config, hub, sessions and strategies.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use stepwise_adapters::ScriptedSession;
/// use stepwise_models::DapEvent;
/// use stepwise_runtime::{StepConfig, StepParams, StepRuntime};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runtime = StepRuntime::new(StepConfig::default());
///
/// let session = ScriptedSession::new("s1", "single-thread").with_handler(|req, events| {
///     match req.command.as_str() {
///         "threads" => Ok(json!({"threads": [{"id": 1, "name": "main"}]})),
///         "stackTrace" => Ok(json!({"stackFrames": [
///             {"id": 1, "name": "main", "source": {"path": "src/a.ts"}, "line": 10, "column": 3}
///         ]})),
///         "next" => {
///             events.emit(DapEvent::stopped(1, "step"));
///             Ok(json!({}))
///         }
///         _ => Ok(json!({})),
///     }
/// });
/// runtime.register_session(Arc::new(session)).await.unwrap();
///
/// let outcome = runtime.step_over(StepParams::new()).await;
/// assert!(outcome.is_stopped());
/// # }
/// ```
pub struct StepRuntime {
    config: StepConfig,
    sessions: SessionRegistry,
    strategies: StrategyTable,
}

impl StepRuntime {
    /// Creates a runtime with its own hub.
    pub fn new(config: StepConfig) -> Self {
        Self::with_hub(config, EventHub::new())
    }

    /// Creates a runtime from environment configuration.
    pub fn from_env() -> Self {
        Self::new(StepConfig::from_env())
    }

    /// Creates a runtime around an existing hub.
    pub fn with_hub(config: StepConfig, hub: EventHub) -> Self {
        let strategies = StrategyTable::new(&config);
        Self {
            config,
            sessions: SessionRegistry::new(hub),
            strategies,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Returns the event hub.
    pub fn hub(&self) -> &EventHub {
        self.sessions.hub()
    }

    /// Returns the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Returns the strategy table.
    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Adds strategies for an adapter family.
    pub fn register_family(&mut self, family: impl Into<String>, strategies: StrategySet) {
        self.strategies.register(family, strategies);
    }

    /// Registers a session, failing fast when its family has no strategies.
    pub async fn register_session(&self, session: Arc<dyn DebugSession>) -> Result<()> {
        self.strategies.for_session(session.as_ref())?;
        self.sessions.register(session).await;
        Ok(())
    }

    /// Forgets a session and its pending waiters.
    pub async fn unregister_session(&self, id: &SessionId) -> bool {
        self.sessions.unregister(id).await
    }

    /// Steps over the current line (`next`).
    pub async fn step_over(&self, params: StepParams) -> Outcome {
        self.step(StepCommand::Next, params).await
    }

    /// Steps into the call on the current line (`stepIn`).
    pub async fn step_into(&self, params: StepParams) -> Outcome {
        self.step(StepCommand::StepIn, params).await
    }

    /// Runs until the current function returns (`stepOut`).
    pub async fn step_out(&self, params: StepParams) -> Outcome {
        self.step(StepCommand::StepOut, params).await
    }

    /// Resumes until the next breakpoint or program exit (`continue`).
    pub async fn continue_execution(&self, params: StepParams) -> Outcome {
        self.step(StepCommand::Continue, params).await
    }

    /// Runs any step command.
    pub async fn step(&self, command: StepCommand, params: StepParams) -> Outcome {
        let (session, request, strategies) = match self.prepare(command, &params).await {
            Ok(prepared) => prepared,
            Err(e) => return self.rejected(command.operation_name(), &params, e),
        };

        orchestrator::execute_step_operation(session.as_ref(), self.hub(), &request, &strategies)
            .await
    }

    /// Waits for the next stop or termination without resuming.
    ///
    /// Uses the continue timeout by default, since the debuggee is
    /// expected to be running.
    pub async fn wait_for_stop(&self, params: StepParams) -> Outcome {
        let prepared = async {
            let timeout = self
                .config
                .resolve_timeout(StepCommand::Continue, params.timeout_ms)?;
            let session = self.sessions.get(params.session_id.as_ref()).await?;
            let strategies = self.strategies.for_session(session.as_ref())?;
            Ok::<_, StepError>((session, strategies, timeout))
        }
        .await;

        let (session, strategies, timeout) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.rejected(WAIT_FOR_STOP_OPERATION, &params, e),
        };

        let contexts: Vec<ExecutionContextId> = params.context_id.into_iter().collect();
        orchestrator::wait_for_outcome(
            session.as_ref(),
            self.hub(),
            &strategies,
            WAIT_FOR_STOP_OPERATION,
            &contexts,
            timeout,
        )
        .await
    }

    /// Lists the execution contexts of a session.
    pub async fn threads(&self, session_id: Option<&SessionId>) -> Result<Vec<Thread>> {
        let session = self.sessions.get(session_id).await?;
        protocol::threads(session.as_ref()).await.map_err(|e| {
            if e.indicates_session_end() {
                StepError::NoSession(format!("{} ({})", session.id(), e))
            } else {
                e.into()
            }
        })
    }

    async fn prepare(
        &self,
        command: StepCommand,
        params: &StepParams,
    ) -> Result<(Arc<dyn DebugSession>, StepRequest, StrategySet)> {
        let timeout = self.config.resolve_timeout(command, params.timeout_ms)?;
        let session = self.sessions.get(params.session_id.as_ref()).await?;
        let strategies = self.strategies.for_session(session.as_ref())?;

        let mut builder = StepRequestBuilder::new(session.id().clone(), command).timeout(timeout);
        if let Some(context) = params.context_id {
            builder = builder.context(context);
        }
        if let Some(hint) = &params.source_hint {
            builder = builder.source_hint(hint.clone());
        }

        debug!(
            session_id = %session.id(),
            %command,
            timeout_ms = timeout.as_millis() as u64,
            "prepared step request"
        );

        Ok((session, builder.build(), strategies))
    }

    fn rejected(&self, operation: &str, params: &StepParams, err: StepError) -> Outcome {
        let outcome = err.into_outcome();
        let session_id = params
            .session_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("-");
        log_outcome(operation, session_id, "-", &outcome);
        outcome
    }
}
