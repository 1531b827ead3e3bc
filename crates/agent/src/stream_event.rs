//! Agent-level streaming events.
//!
//! `AgentStreamEvent` lifts backend deltas and dispatch outcomes into
//! events a front end can render live while a session runs.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent while a session runs.
///
/// - `chunk`           : partial text from a streamed response
/// - `stream_restarted`: earlier chunks of this round are void; the
///                        response is being fetched again in buffered mode
/// - `tool_call`       : the agent is invoking a tool
/// - `tool_result`     : tool execution completed
/// - `done`            : the session reached a terminal status
/// - `error`           : the backend failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the LLM.
    Chunk { content: String },

    /// The streamed response turned out to request tools.
    StreamRestarted { deltas_consumed: usize },

    /// The agent is calling a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// The session is finished.
    Done {
        conversation_id: String,
        status: String,
        steps: u32,
    },

    /// The backend failed; the session ends with status `failed`.
    Error { message: String },
}

impl AgentStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::StreamRestarted { .. } => "stream_restarted",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentStreamEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = AgentStreamEvent::ToolCall {
            id: "call_1".into(),
            name: "web_search".into(),
            input: serde_json::json!({"query": "tokio"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""name":"web_search""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = AgentStreamEvent::Done {
            conversation_id: "abc".into(),
            status: "completed".into(),
            steps: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""steps":2"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            AgentStreamEvent::StreamRestarted { deltas_consumed: 3 }.event_type(),
            "stream_restarted"
        );
        assert_eq!(
            AgentStreamEvent::Error {
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"stream_restarted","deltas_consumed":3}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::StreamRestarted { deltas_consumed } => assert_eq!(deltas_consumed, 3),
            _ => panic!("Wrong variant"),
        }
    }
}
