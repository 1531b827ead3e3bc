//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, DeepSeek, and any endpoint
//! exposing `/v1/chat/completions`.
//!
//! Supports:
//! - Chat completions (buffered and streaming SSE)
//! - Tool use / function calling
//! - Health checks

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use toolloop_core::error::ProviderError;
use toolloop_core::message::{Message, Role, ToolCall};
use toolloop_core::provider::*;
use toolloop_core::stream::{DeltaStream, StreamDelta, ToolCallDelta};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    /// Used when a request leaves `model` empty
    default_model: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: None,
            client,
        }
    }

    /// Model to send when a request does not name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve_model(&self, mut request: ProviderRequest) -> ProviderRequest {
        if request.model.is_empty() {
            if let Some(model) = &self.default_model {
                request.model = model.clone();
            }
        }
        request
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// POST the body and map non-success statuses to provider errors.
    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ModelNotFound(error_body));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let request = self.resolve_model(request);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let message =
            Message::assistant(choice.message.content.unwrap_or_default()).with_tool_calls(tool_calls);

        let usage = api_response.usage.map(ApiUsage::into_usage);

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(&self, request: ProviderRequest) -> Result<DeltaStream, ProviderError> {
        let request = self.resolve_model(request);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, stream) = DeltaStream::channel(64);
        let provider_name = self.name.clone();

        // The task owns the HTTP response; aborting it drops the connection.
        let producer = tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                for line in drain_lines(&mut buffer) {
                    match parse_sse_line(&line) {
                        Some(SseEvent::Done) => {
                            let _ = tx.send(Ok(StreamDelta::done())).await;
                            return;
                        }
                        Some(SseEvent::Chunk(data)) => {
                            match serde_json::from_str::<StreamResponse>(&data) {
                                Ok(chunk) => {
                                    for delta in chunk.into_deltas() {
                                        if tx.send(Ok(delta)).await.is_err() {
                                            return; // receiver released
                                        }
                                    }
                                }
                                Err(e) => {
                                    trace!(
                                        provider = %provider_name,
                                        data = %data,
                                        error = %e,
                                        "Ignoring unparseable SSE chunk"
                                    );
                                }
                            }
                        }
                        None => {}
                    }
                }
            }

            // Body ended without [DONE]
            let _ = tx.send(Ok(StreamDelta::done())).await;
        });

        Ok(stream.with_producer(producer.abort_handle()))
    }
}

/// Split complete lines off the front of the byte buffer, leaving any
/// partial trailing line in place. Lines are decoded only once complete, so
/// a multi-byte character split across network chunks survives.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = String::from_utf8_lossy(&raw[..line_end]);
        lines.push(line.trim_end_matches('\r').to_string());
    }
    lines
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(String),
    Done,
}

/// Interpret one SSE line. Comments, blank lines, and non-data fields
/// yield `None`.
fn parse_sse_line(line: &str) -> Option<SseEvent> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Chunk(data.to_string()))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: ApiDelta,
}

#[derive(Debug, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCallDelta>>,
}

/// A tool call fragment: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct ApiToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ApiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl StreamResponse {
    /// Translate a wire chunk into domain deltas. Fragments are forwarded
    /// as they arrive so callers can react to tool-call intent early.
    fn into_deltas(self) -> Vec<StreamDelta> {
        let mut deltas = Vec::new();

        if let Some(choice) = self.choices.into_iter().next() {
            let content = choice.delta.content.filter(|c| !c.is_empty());
            let tool_calls: Vec<ToolCallDelta> = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    ToolCallDelta {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                    }
                })
                .collect();

            if content.is_some() || !tool_calls.is_empty() {
                deltas.push(StreamDelta {
                    content,
                    tool_calls,
                    ..StreamDelta::default()
                });
            }
        }

        if let Some(usage) = self.usage {
            deltas.push(StreamDelta {
                usage: Some(usage.into_usage()),
                ..StreamDelta::default()
            });
        }

        deltas
    }
}
