//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a [`DeltaStream`] of fragments.
//!
//! Retry policy, if any, belongs to the provider (see the retrying wrapper in
//! `toolloop-providers`), never to the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::stream::{DeltaStream, StreamDelta, ToolCallDelta};

/// How the backend is asked to deliver a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// One complete message after full computation.
    Buffered,
    /// Incremental fragments, restarted in buffered mode when the response
    /// turns out to be tool-call shaped.
    #[default]
    Streamed,
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered => write!(f, "buffered"),
            Self::Streamed => write!(f, "streamed"),
        }
    }
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buffered" => Ok(Self::Buffered),
            "streamed" | "stream" | "streaming" => Ok(Self::Streamed),
            other => Err(format!("unknown response mode '{other}'")),
        }
    }
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (buffered) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The model backend capability.
///
/// The agent loop calls `complete()` or `stream()` without knowing which
/// backend is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response deltas.
    ///
    /// Default implementation calls `complete()` and replays the result as a
    /// content delta, one delta per tool call, and a final done delta.
    async fn stream(&self, request: ProviderRequest) -> Result<DeltaStream, ProviderError> {
        let response = self.complete(request).await?;
        Ok(DeltaStream::from_deltas(response_to_deltas(response)))
    }

    /// Whether `stream()` delivers real incremental output. Backends that
    /// only emulate streaming are driven in buffered mode, so the default is
    /// `false` and real streaming backends opt in.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Split a complete response into the delta sequence a stream would carry.
pub fn response_to_deltas(response: ProviderResponse) -> Vec<StreamDelta> {
    let ProviderResponse { message, usage, .. } = response;
    let mut deltas = Vec::with_capacity(message.tool_calls.len() + 2);

    if !message.content.is_empty() {
        deltas.push(StreamDelta::text(message.content));
    }
    for (index, call) in message.tool_calls.into_iter().enumerate() {
        deltas.push(StreamDelta::tool_call(ToolCallDelta {
            index: index as u32,
            id: Some(call.id),
            name: Some(call.name),
            arguments: Some(call.arguments),
        }));
    }
    deltas.push(StreamDelta {
        done: true,
        usage,
        ..StreamDelta::default()
    });
    deltas
}
