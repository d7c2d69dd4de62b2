//! Step request execution.

use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use stepwise_adapters::{DebugSession, ProtocolError};
use stepwise_models::{ExecutionContextId, StepCommand};

/// Issues the step request(s) for resolved contexts.
///
/// Execution finishes when the adapter has accepted the request, not when
/// the step has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepExecutor {
    /// One request for the first context.
    Single,
    /// One request per context, sent concurrently.
    Multi,
}

impl StepExecutor {
    /// Sends `command` to the given contexts.
    ///
    /// `Multi` fails only when every request was rejected, with the first
    /// rejection.
    pub async fn execute(
        &self,
        session: &dyn DebugSession,
        command: StepCommand,
        contexts: &[ExecutionContextId],
    ) -> Result<(), ProtocolError> {
        let name = command.protocol_name();

        match self {
            StepExecutor::Single => {
                let args = match contexts.first() {
                    Some(context) => json!({ "threadId": context.get() }),
                    None => json!({}),
                };
                debug!(
                    session_id = %session.id(),
                    command = name,
                    ?contexts,
                    "sending step request"
                );
                session.send_request(name, args).await.map(|_| ())
            }
            StepExecutor::Multi => {
                debug!(
                    session_id = %session.id(),
                    command = name,
                    ?contexts,
                    "sending step requests"
                );

                let results = join_all(contexts.iter().map(|context| {
                    session.send_request(name, json!({ "threadId": context.get() }))
                }))
                .await;

                let mut first_error = None;
                let mut accepted = 0usize;
                for (context, result) in contexts.iter().zip(results) {
                    match result {
                        Ok(_) => accepted += 1,
                        Err(e) => {
                            warn!(
                                session_id = %session.id(),
                                context = %context,
                                error = %e,
                                "step request rejected"
                            );
                            first_error.get_or_insert(e);
                        }
                    }
                }

                match first_error {
                    Some(e) if accepted == 0 => Err(e),
                    _ => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_adapters::ScriptedSession;

    fn ctx(id: i64) -> ExecutionContextId {
        ExecutionContextId::new(id)
    }

    #[tokio::test]
    async fn test_single_sends_one_request() {
        let session = ScriptedSession::new("s1", "single-thread");

        StepExecutor::Single
            .execute(&session, StepCommand::StepIn, &[ctx(1), ctx(2)])
            .await
            .unwrap();

        let requests = session.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].command, "stepIn");
        assert_eq!(requests[0].thread_id(), Some(1));
    }

    #[tokio::test]
    async fn test_single_surfaces_rejection() {
        let session = ScriptedSession::new("s1", "single-thread")
            .with_handler(|req, _| Err(ProtocolError::rejected(&req.command, "not paused")));

        let err = StepExecutor::Single
            .execute(&session, StepCommand::Next, &[ctx(1)])
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::rejected("next", "not paused"));
    }

    #[tokio::test]
    async fn test_multi_sends_one_request_per_context() {
        let session = ScriptedSession::new("s1", "multi-context");

        StepExecutor::Multi
            .execute(&session, StepCommand::StepOut, &[ctx(1), ctx(2), ctx(3)])
            .await
            .unwrap();

        let mut ids: Vec<i64> = session
            .requests_for("stepOut")
            .iter()
            .filter_map(|r| r.thread_id())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_multi_partial_rejection_succeeds() {
        let session = ScriptedSession::new("s1", "multi-context").with_handler(|req, _| {
            if req.thread_id() == Some(2) {
                Err(ProtocolError::rejected("next", "isolate not paused"))
            } else {
                Ok(serde_json::json!({}))
            }
        });

        let result = StepExecutor::Multi
            .execute(&session, StepCommand::Next, &[ctx(1), ctx(2)])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_multi_all_rejected_fails() {
        let session = ScriptedSession::new("s1", "multi-context")
            .with_handler(|_, _| Err(ProtocolError::rejected("next", "isolate not paused")));

        let err = StepExecutor::Multi
            .execute(&session, StepCommand::Next, &[ctx(1), ctx(2)])
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::rejected("next", "isolate not paused"));
    }
}
