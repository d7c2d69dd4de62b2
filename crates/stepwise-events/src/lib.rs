//! Thread-safe event routing for stepwise.
//!
//! This crate provides the `EventHub`, the single place where asynchronous
//! debug adapter events meet the step operations waiting for them:
//! - Per-session registration tables behind one `Mutex`
//! - One-shot delivery using `oneshot` channels
//! - Stop history for context resolution (last stop, most recent stop)
//!
//! A waiter must register before triggering the action it waits on; events
//! published before a registration exists are never replayed to it.
//!
//! # Example
//!
//! ```
//! use stepwise_adapters::ScriptedSession;
//! use stepwise_events::{EventHub, EventPredicate};
//! use stepwise_models::{DapEvent, ExecutionContextId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = EventHub::new();
//! let session = ScriptedSession::new("s1", "single-thread");
//! let _feed = hub.attach(&session);
//!
//! let predicate = EventPredicate::outcome(&[ExecutionContextId::new(1)]);
//! let mut waiter = hub.subscribe(&"s1".into(), predicate);
//! session.emit(DapEvent::terminated());
//!
//! assert!(waiter.recv().await.is_ok());
//! assert!(hub.is_terminated(&"s1".into()));
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod hub;

pub use error::{EventError, Result};
pub use filter::EventPredicate;
pub use hub::{Delivery, EventHub, Subscription, RECENT_EVENT_CAPACITY};
