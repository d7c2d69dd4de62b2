//! Live session registry.
//!
//! The registry is the component that wires each session's event stream
//! into the hub. Sessions are created and destroyed by whoever owns the
//! connection; the registry only tracks them while they are registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use stepwise_adapters::{DebugSession, EventFeed};
use stepwise_events::EventHub;
use stepwise_models::SessionId;

use crate::error::{Result, StepError};

struct RegisteredSession {
    session: Arc<dyn DebugSession>,
    /// Detaches the hub listener when dropped.
    _feed: EventFeed,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, RegisteredSession>,
    active: Option<SessionId>,
}

/// Tracks live sessions and the active one.
pub struct SessionRegistry {
    hub: EventHub,
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    /// Creates an empty registry feeding `hub`.
    pub fn new(hub: EventHub) -> Self {
        Self {
            hub,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// The hub sessions are attached to.
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Registers a session, attaches its events to the hub and makes it
    /// the active session.
    ///
    /// Re-registering an id replaces the previous session and drops the
    /// hub state it left behind.
    pub async fn register(&self, session: Arc<dyn DebugSession>) {
        let id = session.id().clone();
        let mut state = self.state.write().await;

        if let Some(previous) = state.sessions.remove(&id) {
            drop(previous);
            let pending = self.hub.disconnect(&id);
            debug!(session_id = %id, pending, "replacing registered session");
        }

        let feed = self.hub.attach(session.as_ref());

        info!(
            session_id = %id,
            family = %session.adapter_family(),
            session_type = %session.session_type(),
            "session registered"
        );

        state.sessions.insert(
            id.clone(),
            RegisteredSession {
                session,
                _feed: feed,
            },
        );
        state.active = Some(id);
    }

    /// Makes a registered session the active one.
    pub async fn set_active(&self, id: &SessionId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(id) {
            return Err(StepError::NoSession(id.to_string()));
        }
        state.active = Some(id.clone());
        Ok(())
    }

    /// The active session, if any.
    pub async fn active(&self) -> Option<Arc<dyn DebugSession>> {
        let state = self.state.read().await;
        state
            .active
            .as_ref()
            .and_then(|id| state.sessions.get(id))
            .map(|r| Arc::clone(&r.session))
    }

    /// The session with `id`, or the active session when `id` is `None`.
    pub async fn get(&self, id: Option<&SessionId>) -> Result<Arc<dyn DebugSession>> {
        match id {
            Some(id) => {
                let state = self.state.read().await;
                state
                    .sessions
                    .get(id)
                    .map(|r| Arc::clone(&r.session))
                    .ok_or_else(|| StepError::NoSession(id.to_string()))
            }
            None => self
                .active()
                .await
                .ok_or_else(|| StepError::NoSession("no active debug session".to_string())),
        }
    }

    /// Forgets a session: detaches its events and drops its hub state.
    ///
    /// Returns false if the id was not registered.
    pub async fn unregister(&self, id: &SessionId) -> bool {
        let removed = {
            let mut state = self.state.write().await;
            if state.active.as_ref() == Some(id) {
                state.active = None;
            }
            state.sessions.remove(id)
        };

        let Some(removed) = removed else {
            return false;
        };
        drop(removed);

        let pending = self.hub.disconnect(id);
        debug!(session_id = %id, pending, "session unregistered");
        true
    }

    /// Lists registered session ids.
    pub async fn list(&self) -> Vec<SessionId> {
        self.state.read().await.sessions.keys().cloned().collect()
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Returns true if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.sessions.is_empty()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_adapters::ScriptedSession;
    use stepwise_events::EventPredicate;
    use stepwise_models::DapEvent;

    fn sid(id: &str) -> SessionId {
        SessionId::from_string(id)
    }

    #[tokio::test]
    async fn test_register_sets_active() {
        let registry = SessionRegistry::new(EventHub::new());
        assert!(registry.is_empty().await);

        registry
            .register(Arc::new(ScriptedSession::new("s1", "single-thread")))
            .await;
        registry
            .register(Arc::new(ScriptedSession::new("s2", "multi-context")))
            .await;

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.active().await.unwrap().id(), &sid("s2"));
        assert_eq!(registry.get(None).await.unwrap().id(), &sid("s2"));
        assert_eq!(registry.get(Some(&sid("s1"))).await.unwrap().id(), &sid("s1"));
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let registry = SessionRegistry::new(EventHub::new());

        let err = registry.get(None).await.err().unwrap();
        assert!(matches!(err, StepError::NoSession(_)));

        let err = registry.get(Some(&sid("missing"))).await.err().unwrap();
        assert_eq!(err, StepError::NoSession("missing".into()));
    }

    #[tokio::test]
    async fn test_set_active() {
        let registry = SessionRegistry::new(EventHub::new());
        registry
            .register(Arc::new(ScriptedSession::new("s1", "single-thread")))
            .await;
        registry
            .register(Arc::new(ScriptedSession::new("s2", "single-thread")))
            .await;

        registry.set_active(&sid("s1")).await.unwrap();
        assert_eq!(registry.get(None).await.unwrap().id(), &sid("s1"));
        assert!(registry.set_active(&sid("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_events_reach_hub() {
        let hub = EventHub::new();
        let registry = SessionRegistry::new(hub.clone());
        let session = Arc::new(ScriptedSession::new("s1", "single-thread"));
        registry.register(session.clone()).await;

        session.emit(DapEvent::stopped(3, "breakpoint"));
        assert_eq!(hub.last_stopped_context(&sid("s1")).map(|c| c.get()), Some(3));
    }

    #[tokio::test]
    async fn test_unregister_cleans_up() {
        let hub = EventHub::new();
        let registry = SessionRegistry::new(hub.clone());
        let session = Arc::new(ScriptedSession::new("s1", "single-thread"));
        registry.register(session.clone()).await;

        let mut pending = hub.subscribe(&sid("s1"), EventPredicate::outcome(&[]));
        assert_eq!(session.listener_count(), 1);

        assert!(registry.unregister(&sid("s1")).await);
        assert_eq!(session.listener_count(), 0);
        assert!(pending.recv().await.is_err());
        assert_eq!(hub.session_count(), 0);
        assert!(registry.active().await.is_none());

        assert!(!registry.unregister(&sid("s1")).await);
    }

    #[tokio::test]
    async fn test_reregister_after_termination_starts_fresh() {
        let hub = EventHub::new();
        let registry = SessionRegistry::new(hub.clone());

        let first = Arc::new(ScriptedSession::new("s1", "single-thread"));
        registry.register(first.clone()).await;
        first.emit(DapEvent::exited(3));
        first.emit(DapEvent::terminated());
        assert!(hub.is_terminated(&sid("s1")));

        let second = Arc::new(ScriptedSession::new("s1", "single-thread"));
        registry.register(second.clone()).await;

        assert!(!hub.is_terminated(&sid("s1")));
        assert_eq!(hub.exit_code(&sid("s1")), None);
        assert_eq!(first.listener_count(), 0);
        assert_eq!(registry.len().await, 1);

        second.emit(DapEvent::stopped(2, "breakpoint"));
        assert_eq!(hub.last_stopped_context(&sid("s1")).map(|c| c.get()), Some(2));
    }
}
