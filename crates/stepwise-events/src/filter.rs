//! Event predicates for hub registrations.

use stepwise_models::{DapEvent, DapEventKind, ExecutionContextId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    /// A stop of one of these contexts; empty means any context.
    StoppedOn(Vec<ExecutionContextId>),
    /// `terminated` or `exited`.
    SessionEnd,
    /// Any event of this kind.
    Kind(DapEventKind),
}

impl Clause {
    fn matches(&self, event: &DapEvent) -> bool {
        match self {
            Clause::StoppedOn(contexts) => {
                if event.kind() != DapEventKind::Stopped {
                    return false;
                }
                if contexts.is_empty() || event.all_threads_stopped() {
                    return true;
                }
                match event.thread_id() {
                    Some(id) => contexts.contains(&id),
                    None => true,
                }
            }
            Clause::SessionEnd => event.kind().ends_session(),
            Clause::Kind(kind) => event.kind() == *kind,
        }
    }
}

/// Which events a registration is interested in.
///
/// Clauses are OR'ed. An empty predicate matches nothing.
///
/// # Example
///
/// ```
/// use stepwise_events::EventPredicate;
/// use stepwise_models::{DapEvent, ExecutionContextId};
///
/// let predicate = EventPredicate::outcome(&[ExecutionContextId::new(1)]);
/// assert!(predicate.matches(&DapEvent::stopped(1, "step")));
/// assert!(predicate.matches(&DapEvent::terminated()));
/// assert!(!predicate.matches(&DapEvent::stopped(2, "breakpoint")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPredicate {
    clauses: Vec<Clause>,
}

impl EventPredicate {
    /// Creates a predicate that matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop of one of `contexts` or the end of the session.
    pub fn outcome(contexts: &[ExecutionContextId]) -> Self {
        Self::new().stopped_on(contexts).session_end()
    }

    /// Matches stops of the given contexts (any context when empty).
    ///
    /// Stops without a thread id, or with `allThreadsStopped`, match any set.
    pub fn stopped_on(mut self, contexts: &[ExecutionContextId]) -> Self {
        self.clauses.push(Clause::StoppedOn(contexts.to_vec()));
        self
    }

    /// Matches `terminated` and `exited`.
    pub fn session_end(mut self) -> Self {
        self.clauses.push(Clause::SessionEnd);
        self
    }

    /// Matches every event of `kind`.
    pub fn kind(mut self, kind: DapEventKind) -> Self {
        self.clauses.push(Clause::Kind(kind));
        self
    }

    /// Matches whatever either predicate matches.
    pub fn or(mut self, other: EventPredicate) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// Returns true if the event matches this predicate.
    pub fn matches(&self, event: &DapEvent) -> bool {
        self.clauses.iter().any(|c| c.matches(event))
    }
}
