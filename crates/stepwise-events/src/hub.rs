//! EventHub - routes asynchronous protocol events to step waiters.
//!
//! Uses the same concurrency building blocks as the rest of the runtime:
//! - `Arc<Mutex<HashMap>>` for the per-session registration table
//! - `oneshot` channels so every registration resolves at most once

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use stepwise_adapters::{DebugSession, EventFeed};
use stepwise_models::{DapEvent, DapEventKind, ExecutionContextId, SessionId};

use crate::error::{EventError, Result};
use crate::filter::EventPredicate;

/// Number of recent events kept per session for diagnostics.
pub const RECENT_EVENT_CAPACITY: usize = 100;

/// How a registration competes for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// The first matching exclusive registration consumes the event.
    #[default]
    Exclusive,
    /// Receives matching events without consuming them.
    Observe,
}

struct Registration {
    id: u64,
    predicate: EventPredicate,
    delivery: Delivery,
    tx: oneshot::Sender<DapEvent>,
}

/// Per-session state.
#[derive(Default)]
struct SessionBucket {
    registrations: Vec<Registration>,
    last_stopped: Option<ExecutionContextId>,
    stop_seq: HashMap<ExecutionContextId, u64>,
    next_seq: u64,
    terminated: bool,
    exit_code: Option<i64>,
    recent: VecDeque<DapEvent>,
}

impl SessionBucket {
    fn record(&mut self, event: &DapEvent) {
        self.recent.push_back(event.clone());
        if self.recent.len() > RECENT_EVENT_CAPACITY {
            self.recent.pop_front();
        }

        match event.kind() {
            DapEventKind::Stopped => {
                if let Some(context) = event.thread_id() {
                    self.next_seq += 1;
                    self.stop_seq.insert(context, self.next_seq);
                    self.last_stopped = Some(context);
                }
            }
            DapEventKind::Thread if event.reason() == Some("exited") => {
                if let Some(context) = event.thread_id() {
                    self.stop_seq.remove(&context);
                    if self.last_stopped == Some(context) {
                        self.last_stopped = None;
                    }
                }
            }
            DapEventKind::Exited => {
                self.exit_code = event.exit_code();
                self.terminated = true;
            }
            DapEventKind::Terminated => {
                self.terminated = true;
            }
            _ => {}
        }
    }

    /// Hands the event to matching registrations; returns how many got it.
    fn dispatch(&mut self, event: &DapEvent) -> usize {
        // Nothing can follow a session end, so every waiter hears about it.
        let broadcast = event.kind().ends_session();
        let mut consumed = false;
        let mut delivered = 0;
        let mut kept = Vec::with_capacity(self.registrations.len());

        for registration in self.registrations.drain(..) {
            if registration.tx.is_closed() {
                continue;
            }

            let eligible = registration.predicate.matches(event)
                && (broadcast || registration.delivery == Delivery::Observe || !consumed);

            if !eligible {
                kept.push(registration);
                continue;
            }

            let delivery = registration.delivery;
            if registration.tx.send(event.clone()).is_ok() {
                delivered += 1;
                if delivery == Delivery::Exclusive {
                    consumed = true;
                }
            }
        }

        self.registrations = kept;
        delivered
    }
}

struct HubInner {
    sessions: Mutex<HashMap<SessionId, SessionBucket>>,
    next_id: AtomicU64,
}

impl HubInner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionBucket>> {
        // A panic while holding the lock cannot leave a bucket half-updated
        // in a way that matters more than losing every waiter.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, session_id: &SessionId, event: DapEvent) -> usize {
        let mut sessions = self.sessions();
        let bucket = sessions.entry(session_id.clone()).or_default();
        bucket.record(&event);
        let delivered = bucket.dispatch(&event);

        trace!(
            session_id = %session_id,
            event = %event.event,
            delivered,
            pending = bucket.registrations.len(),
            "published event"
        );

        delivered
    }

    fn remove(&self, session_id: &SessionId, registration_id: u64) {
        let mut sessions = self.sessions();
        if let Some(bucket) = sessions.get_mut(session_id) {
            bucket.registrations.retain(|r| r.id != registration_id);
        }
    }
}

/// Single dispatcher for asynchronous protocol events of all live sessions.
///
/// The hub is explicit process-scoped state: whoever wires the transport to
/// the step runtime creates one and hands clones to the pieces that need
/// it. Cloning is cheap and every clone shares the same table.
///
/// # Example
///
/// ```
/// use stepwise_events::{EventHub, EventPredicate};
/// use stepwise_models::{DapEvent, ExecutionContextId, SessionId};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let hub = EventHub::new();
/// let session = SessionId::from_string("s1");
///
/// // Subscribe before the action whose completion is awaited.
/// let predicate = EventPredicate::outcome(&[ExecutionContextId::new(1)]);
/// let mut waiter = hub.subscribe(&session, predicate);
///
/// hub.publish(&session, DapEvent::stopped(1, "step"));
/// let event = waiter.recv().await.unwrap();
/// assert_eq!(event.reason(), Some("step"));
/// # }
/// ```
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                sessions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers an exclusive interest in the next event matching `predicate`.
    pub fn subscribe(&self, session_id: &SessionId, predicate: EventPredicate) -> Subscription {
        self.subscribe_with(session_id, predicate, Delivery::Exclusive)
    }

    /// Registers interest with an explicit delivery mode.
    ///
    /// Only events published after this call can satisfy the registration.
    pub fn subscribe_with(
        &self,
        session_id: &SessionId,
        predicate: EventPredicate,
        delivery: Delivery,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        {
            let mut sessions = self.inner.sessions();
            sessions
                .entry(session_id.clone())
                .or_default()
                .registrations
                .push(Registration {
                    id,
                    predicate,
                    delivery,
                    tx,
                });
        }

        trace!(session_id = %session_id, registration = id, ?delivery, "subscribed");

        Subscription {
            id,
            session_id: session_id.clone(),
            rx,
            hub: Arc::downgrade(&self.inner),
            consumed: false,
        }
    }

    /// Delivers an event that arrived for `session_id`.
    ///
    /// Returns the number of registrations that received it.
    pub fn publish(&self, session_id: &SessionId, event: DapEvent) -> usize {
        self.inner.publish(session_id, event)
    }

    /// Feeds every event of `session` into this hub until the returned feed
    /// is dropped.
    pub fn attach(&self, session: &dyn DebugSession) -> EventFeed {
        let hub = Arc::downgrade(&self.inner);
        let session_id = session.id().clone();

        debug!(
            session_id = %session_id,
            family = %session.adapter_family(),
            "attaching event feed"
        );

        session.on_event(Arc::new(move |event| {
            if let Some(hub) = hub.upgrade() {
                hub.publish(&session_id, event);
            }
        }))
    }

    /// Forgets a session. Pending subscriptions resolve with
    /// [`EventError::Disconnected`].
    ///
    /// Returns the number of registrations that were still pending.
    pub fn disconnect(&self, session_id: &SessionId) -> usize {
        let bucket = self.inner.sessions().remove(session_id);
        let pending = bucket.map(|b| b.registrations.len()).unwrap_or(0);

        debug!(session_id = %session_id, pending, "session disconnected from hub");

        pending
    }

    /// Context of the most recent stop, if any.
    pub fn last_stopped_context(&self, session_id: &SessionId) -> Option<ExecutionContextId> {
        self.inner
            .sessions()
            .get(session_id)
            .and_then(|b| b.last_stopped)
    }

    /// Among `candidates`, the one that stopped most recently.
    ///
    /// Returns `None` if none of them ever reported a stop.
    pub fn most_recent_stop(
        &self,
        session_id: &SessionId,
        candidates: &[ExecutionContextId],
    ) -> Option<ExecutionContextId> {
        let sessions = self.inner.sessions();
        let bucket = sessions.get(session_id)?;
        candidates
            .iter()
            .filter_map(|c| bucket.stop_seq.get(c).map(|seq| (*seq, *c)))
            .max()
            .map(|(_, c)| c)
    }

    /// True once `terminated` or `exited` was published for the session.
    pub fn is_terminated(&self, session_id: &SessionId) -> bool {
        self.inner
            .sessions()
            .get(session_id)
            .map(|b| b.terminated)
            .unwrap_or(false)
    }

    /// Exit code from the session's `exited` event.
    pub fn exit_code(&self, session_id: &SessionId) -> Option<i64> {
        self.inner
            .sessions()
            .get(session_id)
            .and_then(|b| b.exit_code)
    }

    /// Recent events of a session, oldest first.
    pub fn recent_events(&self, session_id: &SessionId) -> Vec<DapEvent> {
        self.inner
            .sessions()
            .get(session_id)
            .map(|b| b.recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registrations still waiting for the session.
    pub fn pending_count(&self, session_id: &SessionId) -> usize {
        self.inner
            .sessions()
            .get(session_id)
            .map(|b| b.registrations.len())
            .unwrap_or(0)
    }

    /// Number of sessions the hub holds state for.
    pub fn session_count(&self) -> usize {
        self.inner.sessions().len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("sessions", &self.session_count())
            .finish()
    }
}

/// Pending interest in one event.
///
/// Completes at most once. Dropping an unresolved subscription removes its
/// registration from the hub.
pub struct Subscription {
    id: u64,
    session_id: SessionId,
    rx: oneshot::Receiver<DapEvent>,
    hub: Weak<HubInner>,
    consumed: bool,
}

impl Subscription {
    /// Session this subscription belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Waits for the matching event.
    ///
    /// Cancel-safe: dropping the future leaves the registration in place.
    pub async fn recv(&mut self) -> Result<DapEvent> {
        if self.consumed {
            return Err(EventError::Consumed);
        }

        let result = (&mut self.rx).await;
        self.consumed = true;
        result.map_err(|_| EventError::Disconnected(self.session_id.to_string()))
    }

    /// Returns the event if it has already been delivered.
    pub fn try_recv(&mut self) -> Option<DapEvent> {
        if self.consumed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => {
                self.consumed = true;
                Some(event)
            }
            Err(_) => None,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.session_id, self.id);
        }
    }
}
