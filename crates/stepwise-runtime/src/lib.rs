//! Step operation orchestrator for stepwise.
//!
//! This crate turns a stepping intent ("step over", "step into", "step out",
//! "continue") into protocol requests against a debug adapter and reports
//! one normalized [`Outcome`](stepwise_models::Outcome):
//! - `ThreadResolver` - decides which execution contexts to step
//! - `StepExecutor` - sends the step request(s)
//! - `WaitStrategy` - detects completion by hub event or by polling
//! - `StrategyTable` - picks the triple for an adapter family
//! - `StepRuntime` - per-command operations on registered sessions
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stepwise_runtime::{StepParams, StepRuntime};
//!
//! #[tokio::main]
//! async fn main() {
//!     let runtime = StepRuntime::from_env();
//!
//!     // Whatever owns the adapter connection implements DebugSession.
//!     runtime.register_session(Arc::new(connect_to_adapter().await)).await?;
//!
//!     let outcome = runtime.step_over(StepParams::new().with_timeout_ms(2_000)).await;
//!     println!("{}", serde_json::to_string(&outcome)?);
//! }
//! ```
//!
//! # Key Concepts
//!
//! ## Ordering
//!
//! Waiters register with the event hub before the step request is sent.
//! An adapter that reports the stop before acknowledging the request is
//! therefore never missed.
//!
//! ## Timeouts
//!
//! A timeout is the only cancellation. The step request is not aborted; a
//! late event is discarded and the caller gets a timeout outcome.

pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
mod poller;
pub mod resolver;
pub mod runtime;
pub mod sessions;
pub mod strategies;
pub mod wait;

pub use config::StepConfig;
pub use error::{Result, StepError};
pub use executor::StepExecutor;
pub use orchestrator::{execute_step_operation, wait_for_outcome};
pub use resolver::ThreadResolver;
pub use runtime::{StepParams, StepRuntime, WAIT_FOR_STOP_OPERATION};
pub use sessions::SessionRegistry;
pub use strategies::{StrategySet, StrategyTable};
pub use wait::{WaitResult, WaitStrategy};
