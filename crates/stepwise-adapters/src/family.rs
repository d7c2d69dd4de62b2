//! Adapter families: debug backends grouped by concurrency model.

use std::fmt;
use std::str::FromStr;

/// Built-in adapter families.
///
/// The tag strings are what sessions report from
/// [`DebugSession::adapter_family`](crate::DebugSession::adapter_family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterFamily {
    /// Pausing halts the whole debuggee; one context is stepped.
    /// Completion is reported by events.
    SingleThread,
    /// Independent contexts (isolates); only the one that hit the breakpoint
    /// pauses while siblings keep running.
    MultiContext,
    /// Like `SingleThread`, but the adapter's stop events are unreliable, so
    /// completion is detected by polling.
    SingleThreadPolling,
}

impl AdapterFamily {
    /// All built-in families.
    pub const ALL: [AdapterFamily; 3] = [
        AdapterFamily::SingleThread,
        AdapterFamily::MultiContext,
        AdapterFamily::SingleThreadPolling,
    ];

    /// Family tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterFamily::SingleThread => "single-thread",
            AdapterFamily::MultiContext => "multi-context",
            AdapterFamily::SingleThreadPolling => "single-thread-polling",
        }
    }

    /// Maps a raw adapter type to its family.
    ///
    /// Returns `None` for adapter types with no known concurrency model.
    pub fn for_session_type(session_type: &str) -> Option<Self> {
        match session_type {
            "dart" => Some(AdapterFamily::MultiContext),
            "pwa-node" | "node" | "pwa-chrome" | "python" | "debugpy" | "coreclr" | "java" => {
                Some(AdapterFamily::SingleThread)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AdapterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdapterFamily::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown adapter family: {}", s))
    }
}
