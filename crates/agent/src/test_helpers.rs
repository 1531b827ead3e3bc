//! Shared test helpers for agent unit tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use toolloop_core::error::{ProviderError, ToolError};
use toolloop_core::message::{Message, ToolCall};
use toolloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use toolloop_core::tool::{Tool, ToolOutput};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided. Relies on the
/// default `stream`, so it never claims real streaming.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    call_count: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        Ok(response)
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(thought).with_tool_calls(tool_calls),
        usage: None,
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(format!("call_{name}"), name, args.to_string())
}

/// Returns its `text` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text(arguments["text"].as_str().unwrap_or_default()))
    }
}

/// Always errors.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "always_fails"
    }

    fn description(&self) -> &str {
        "Fails every time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "always_fails".into(),
            reason: "upstream unavailable".into(),
        })
    }
}

/// Sleeps before answering.
pub struct SlowTool {
    delay: Duration,
}

impl SlowTool {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Takes its time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::text("finally"))
    }
}
