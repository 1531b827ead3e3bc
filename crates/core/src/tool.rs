//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are named, schema-described functions the model can ask the
//! orchestrator to run: search the web, look something up, compute a value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::message::Message;
use crate::provider::ToolDefinition;

/// What a tool returns on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text shown to the model
    pub content: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }
}

/// The outcome of one tool call, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub tool_call_id: String,

    /// The output content (or an error description when `failed`)
    pub content: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Whether the call failed
    pub failed: bool,

    /// Why the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: output.content,
            data: output.data,
            failed: false,
            error_detail: None,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {detail}"),
            data: None,
            failed: true,
            error_detail: Some(detail),
        }
    }

    /// Render as a tool-role message for the transcript.
    pub fn into_message(self) -> Message {
        let mut msg = Message::tool_result(self.tool_call_id, self.content);
        if self.failed {
            msg.metadata.insert("failed".into(), serde_json::Value::Bool(true));
            if let Some(detail) = self.error_detail {
                msg.metadata
                    .insert("error_detail".into(), serde_json::Value::String(detail));
            }
        }
        if let Some(data) = self.data {
            msg.metadata.insert("data".into(), data);
        }
        msg
    }
}

/// The core Tool trait.
///
/// Implementations must be reentrant: the same tool may be running for
/// several calls of one round, and for several sessions, at once.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
