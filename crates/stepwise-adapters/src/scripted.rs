//! In-memory debug session driven by a script.
//!
//! `ScriptedSession` answers requests through a closure and lets the script
//! push events to attached listeners, either synchronously from inside a
//! request (the adapter stops before acknowledging) or later from a spawned
//! task. Harnesses use it to exercise the step runtime without a real
//! debug adapter.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::trace;

use stepwise_models::{DapEvent, DapEventKind, SessionId};

use crate::traits::{DebugSession, EventFeed, EventListener, ProtocolError};

type Listeners = Arc<Mutex<Vec<(u64, EventListener)>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A request received by a scripted session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub command: String,
    pub args: Value,
}

impl RecordedRequest {
    /// `threadId` argument, if any.
    pub fn thread_id(&self) -> Option<i64> {
        self.args.get("threadId").and_then(Value::as_i64)
    }
}

/// Pushes events to a scripted session's listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Listeners,
    active: Arc<AtomicBool>,
}

impl EventEmitter {
    /// Delivers `event` to every attached listener.
    ///
    /// A `terminated` event also marks the session inactive.
    pub fn emit(&self, event: DapEvent) {
        if event.kind() == DapEventKind::Terminated {
            self.active.store(false, Ordering::SeqCst);
        }

        // Call listeners outside the lock so they may attach/detach.
        let listeners: Vec<EventListener> =
            lock(&self.listeners).iter().map(|(_, l)| Arc::clone(l)).collect();

        trace!(event = %event.event, listeners = listeners.len(), "scripted event");

        for listener in listeners {
            listener(event.clone());
        }
    }
}

type Handler =
    Box<dyn Fn(&RecordedRequest, &EventEmitter) -> Result<Value, ProtocolError> + Send + Sync>;

/// In-memory [`DebugSession`].
///
/// # Example
///
/// ```
/// use stepwise_adapters::ScriptedSession;
/// use stepwise_models::DapEvent;
/// use serde_json::json;
///
/// let session = ScriptedSession::new("s1", "single-thread").with_handler(|req, events| {
///     match req.command.as_str() {
///         "threads" => Ok(json!({"threads": [{"id": 1, "name": "main"}]})),
///         "next" => {
///             events.emit(DapEvent::stopped(1, "step"));
///             Ok(json!({}))
///         }
///         _ => Ok(json!({})),
///     }
/// });
/// assert!(session.requests().is_empty());
/// ```
pub struct ScriptedSession {
    id: SessionId,
    family: String,
    session_type: String,
    handler: Handler,
    requests: Mutex<Vec<RecordedRequest>>,
    listeners: Listeners,
    next_listener: AtomicU64,
    active: Arc<AtomicBool>,
}

impl ScriptedSession {
    /// Creates a session that answers every request with `{}`.
    pub fn new(id: impl Into<SessionId>, family: impl Into<String>) -> Self {
        let family = family.into();
        Self {
            id: id.into(),
            session_type: family.clone(),
            family,
            handler: Box::new(|_, _| Ok(json!({}))),
            requests: Mutex::new(Vec::new()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Sets the raw adapter type.
    pub fn with_session_type(mut self, session_type: impl Into<String>) -> Self {
        self.session_type = session_type.into();
        self
    }

    /// Sets the request handler.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RecordedRequest, &EventEmitter) -> Result<Value, ProtocolError>
            + Send
            + Sync
            + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    /// Handle for pushing events from outside a request.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            listeners: Arc::clone(&self.listeners),
            active: Arc::clone(&self.active),
        }
    }

    /// Pushes an event to attached listeners.
    pub fn emit(&self, event: DapEvent) {
        self.emitter().emit(event);
    }

    /// Marks the session active or ended.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Requests received for one command.
    pub fn requests_for(&self, command: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.command == command)
            .cloned()
            .collect()
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl fmt::Debug for ScriptedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedSession")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("session_type", &self.session_type)
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl DebugSession for ScriptedSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn adapter_family(&self) -> &str {
        &self.family
    }

    fn session_type(&self) -> &str {
        &self.session_type
    }

    async fn send_request(&self, command: &str, args: Value) -> Result<Value, ProtocolError> {
        let request = RecordedRequest {
            command: command.to_string(),
            args,
        };
        lock(&self.requests).push(request.clone());
        (self.handler)(&request, &self.emitter())
    }

    fn on_event(&self, listener: EventListener) -> EventFeed {
        let key = self.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).push((key, listener));

        let listeners = Arc::clone(&self.listeners);
        EventFeed::new(move || {
            lock(&listeners).retain(|(k, _)| *k != key);
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
