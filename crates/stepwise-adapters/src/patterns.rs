//! Pattern matching on adapter error messages.
//!
//! Adapters report "the debuggee is gone" and "this thread is running" only
//! as free-form text, so the runtime classifies them by pattern.

use regex::Regex;
use std::sync::OnceLock;

/// A compiled pattern for matching adapter messages.
#[derive(Debug)]
pub struct Pattern {
    /// Human-readable name for this pattern.
    pub name: &'static str,
    regex: Regex,
}

impl Pattern {
    /// Creates a new pattern.
    pub fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Checks if the pattern matches the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Messages meaning the session or debuggee no longer exists.
pub fn session_end_patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Pattern::new("terminated", r"(?i)\bterminated\b"),
            Pattern::new("no_debugger", r"(?i)no debugger available"),
            Pattern::new("session_gone", r"(?i)session (has )?(ended|exited|closed|not found)"),
            Pattern::new("process_exited", r"(?i)process (has )?exited"),
        ]
    })
}

/// Messages meaning the context is running rather than paused.
pub fn not_paused_patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Pattern::new("not_stopped", r"(?i)not (stopped|paused|suspended)"),
            Pattern::new("running", r"(?i)\b(is )?running\b"),
        ]
    })
}

/// Returns true if any pattern matches.
pub fn any_match(text: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(text))
}

/// Returns true if `message` says the session has ended.
pub fn session_ended(message: &str) -> bool {
    any_match(message, session_end_patterns())
}

/// Returns true if `message` says the context is not paused.
pub fn not_paused(message: &str) -> bool {
    any_match(message, not_paused_patterns())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ended() {
        assert!(session_ended("Debug session terminated"));
        assert!(session_ended("No debugger available"));
        assert!(session_ended("session not found: s1"));
        assert!(session_ended("Process has exited with code 0"));
        assert!(!session_ended("Thread 3 is not paused"));
    }

    #[test]
    fn test_not_paused() {
        assert!(not_paused("Thread is not paused"));
        assert!(not_paused("isolate not stopped"));
        assert!(not_paused("thread is running"));
        assert!(!not_paused("Invalid thread id"));
    }

    #[test]
    fn test_not_paused_is_not_session_end() {
        // A running thread must never be mistaken for a finished session.
        assert!(!session_ended("not stopped"));
    }
}
