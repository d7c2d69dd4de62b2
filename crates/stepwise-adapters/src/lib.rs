//! Debug session capability seam for stepwise.
//!
//! This crate defines how the step runtime reaches a debug adapter
//! without knowing who owns the connection.
//!
//! # Key Concepts
//!
//! - **DebugSession**: Trait every live session implements (send a request,
//!   attach an event listener, report liveness)
//! - **AdapterFamily**: Classification of adapters by concurrency model,
//!   used to pick stepping strategies
//! - **protocol**: Typed `threads` / `stackTrace` helpers
//! - **ScriptedSession**: In-memory session for harnesses and tests
//!
//! # Example
//!
//! ```
//! use stepwise_adapters::{AdapterFamily, DebugSession, ScriptedSession};
//!
//! let session = ScriptedSession::new("s1", "single-thread");
//! let family: AdapterFamily = session.adapter_family().parse().unwrap();
//! assert_eq!(family, AdapterFamily::SingleThread);
//! ```

pub mod family;
pub mod patterns;
pub mod protocol;
pub mod scripted;
pub mod traits;

pub use family::AdapterFamily;
pub use protocol::{StackFrame, Source, Thread};
pub use scripted::{EventEmitter, RecordedRequest, ScriptedSession};
pub use traits::{DebugSession, EventFeed, EventListener, ProtocolError};
