//! Typed request helpers and response bodies for the state-inspection
//! requests the runtime issues (`threads`, `stackTrace`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use stepwise_models::ExecutionContextId;

use crate::traits::{DebugSession, ProtocolError};

/// One thread as reported by `threads`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

impl Thread {
    /// The thread id as an execution context.
    pub fn context_id(&self) -> ExecutionContextId {
        ExecutionContextId::new(self.id)
    }
}

/// Body of a `threads` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadsResponse {
    #[serde(default)]
    pub threads: Vec<Thread>,
}

/// Source reference of a stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub column: i64,
}

impl StackFrame {
    /// True when the frame points at real source (not SDK or external code).
    pub fn has_source(&self) -> bool {
        self.line > 0
            && self
                .source
                .as_ref()
                .and_then(|s| s.path.as_deref())
                .is_some_and(|p| !p.is_empty())
    }

    /// Path if known, then name, then `"unknown"`.
    pub fn display_path(&self) -> &str {
        self.source
            .as_ref()
            .and_then(|s| s.path.as_deref().or(s.name.as_deref()))
            .unwrap_or("unknown")
    }

    /// True if the frame's path ends with `hint` (path-component aware).
    pub fn matches_source(&self, hint: &str) -> bool {
        let Some(path) = self.source.as_ref().and_then(|s| s.path.as_deref()) else {
            return false;
        };
        let path = path.replace('\\', "/");
        let hint = hint.replace('\\', "/");
        let hint = hint.trim_start_matches("./");
        path == hint || path.ends_with(&format!("/{}", hint))
    }
}

/// Body of a `stackTrace` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponse {
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
}

fn parse<T: for<'de> Deserialize<'de>>(command: &str, body: Value) -> Result<T, ProtocolError> {
    // Some adapters answer with no body at all.
    let body = if body.is_null() { json!({}) } else { body };
    serde_json::from_value(body).map_err(|e| ProtocolError::Malformed {
        command: command.to_string(),
        message: e.to_string(),
    })
}

/// Lists all threads of a session.
pub async fn threads(session: &dyn DebugSession) -> Result<Vec<Thread>, ProtocolError> {
    let body = session.send_request("threads", json!({})).await?;
    Ok(parse::<ThreadsResponse>("threads", body)?.threads)
}

/// Returns the top frame of a context, or `None` when it has no frames.
pub async fn top_frame(
    session: &dyn DebugSession,
    context: ExecutionContextId,
) -> Result<Option<StackFrame>, ProtocolError> {
    let body = session
        .send_request(
            "stackTrace",
            json!({ "threadId": context.get(), "startFrame": 0, "levels": 1 }),
        )
        .await?;
    Ok(parse::<StackTraceResponse>("stackTrace", body)?
        .stack_frames
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(path: Option<&str>, line: i64) -> StackFrame {
        StackFrame {
            id: 1,
            name: "main".into(),
            source: Some(Source {
                path: path.map(str::to_string),
                name: Some("main.dart".into()),
            }),
            line,
            column: 1,
        }
    }

    #[test]
    fn test_has_source() {
        assert!(frame(Some("/app/lib/main.dart"), 3).has_source());
        assert!(!frame(Some("/app/lib/main.dart"), 0).has_source());
        assert!(!frame(None, 3).has_source());
    }

    #[test]
    fn test_display_path_fallbacks() {
        assert_eq!(frame(Some("/a.ts"), 1).display_path(), "/a.ts");
        assert_eq!(frame(None, 1).display_path(), "main.dart");

        let bare = StackFrame {
            id: 1,
            name: String::new(),
            source: None,
            line: 1,
            column: 1,
        };
        assert_eq!(bare.display_path(), "unknown");
    }

    #[test]
    fn test_matches_source() {
        let f = frame(Some("/app/lib/main.dart"), 3);
        assert!(f.matches_source("lib/main.dart"));
        assert!(f.matches_source("/app/lib/main.dart"));
        assert!(f.matches_source("./main.dart"));
        assert!(!f.matches_source("ain.dart"));
        assert!(!f.matches_source("lib/other.dart"));
    }

    #[test]
    fn test_parse_stack_trace() {
        let body = serde_json::json!({
            "stackFrames": [
                {"id": 5, "name": "f", "source": {"path": "src/a.ts"}, "line": 10, "column": 3}
            ],
            "totalFrames": 1
        });
        let parsed: StackTraceResponse = parse("stackTrace", body).unwrap();
        assert_eq!(parsed.stack_frames.len(), 1);
        assert_eq!(parsed.stack_frames[0].display_path(), "src/a.ts");
    }

    #[test]
    fn test_parse_null_body() {
        let parsed: ThreadsResponse = parse("threads", Value::Null).unwrap();
        assert!(parsed.threads.is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse::<ThreadsResponse>("threads", serde_json::json!({"threads": 5}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
    }
}
