//! Core data models for stepwise.
//!
//! This crate provides the plain data types shared by the event hub and the
//! step runtime: session and execution-context ids, step commands and
//! requests, protocol events, and the normalized `Outcome`.

pub mod builders;
pub mod event;
pub mod ids;
pub mod outcome;
pub mod step;

pub use builders::{StepRequestBuilder, DEFAULT_CONTINUE_TIMEOUT, DEFAULT_STEP_TIMEOUT};
pub use event::{DapEvent, DapEventKind};
pub use ids::{ExecutionContextId, SessionId};
pub use outcome::{ErrorCode, Outcome};
pub use step::{StepCommand, StepRequest};
