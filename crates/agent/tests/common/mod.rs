//! Scripted provider and tools for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};
use toolloop_core::error::{ProviderError, ToolError};
use toolloop_core::message::{Message, ToolCall};
use toolloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use toolloop_core::stream::{DeltaStream, StreamDelta, ToolCallDelta};
use toolloop_core::tool::{Tool, ToolOutput};

/// One scripted model turn.
#[derive(Clone)]
pub enum Turn {
    /// A final answer.
    Text(String),
    /// Text followed by tool calls. Streamed as two text deltas, then the
    /// call fragments.
    Tools { lead: String, calls: Vec<ToolCall> },
    /// The provider rejects the request.
    Fail(ProviderError),
    /// A stream that breaks after one text delta.
    Interrupted,
    /// Never finishes: `complete` stays pending, a stream sends one text
    /// delta and then nothing.
    Stall,
}

impl Turn {
    pub fn text(s: &str) -> Self {
        Self::Text(s.into())
    }

    pub fn tools(lead: &str, calls: Vec<ToolCall>) -> Self {
        Self::Tools {
            lead: lead.into(),
            calls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Stream,
    Complete,
}

type DeltaItem = Result<StreamDelta, ProviderError>;

/// A provider that plays back [`Turn`]s.
///
/// A tool-shaped turn answered through `stream` stays queued so the
/// buffered re-request of the same round sees it too.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    streaming: bool,
    calls: Mutex<Vec<Call>>,
    request_sizes: Mutex<Vec<usize>>,
    open_streams: Mutex<Vec<mpsc::Sender<DeltaItem>>>,
    pub stream_opened: Notify,
}

impl ScriptedProvider {
    pub fn buffered(turns: Vec<Turn>) -> Self {
        Self::new(turns, false)
    }

    pub fn streaming(turns: Vec<Turn>) -> Self {
        Self::new(turns, true)
    }

    fn new(turns: Vec<Turn>, streaming: bool) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            streaming,
            calls: Mutex::new(Vec::new()),
            request_sizes: Mutex::new(Vec::new()),
            open_streams: Mutex::new(Vec::new()),
            stream_opened: Notify::new(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of messages sent with each request.
    pub fn request_sizes(&self) -> Vec<usize> {
        self.request_sizes.lock().unwrap().clone()
    }

    pub fn streams_opened(&self) -> usize {
        self.open_streams.lock().unwrap().len()
    }

    /// Whether every stream handed out has been closed or dropped.
    pub fn all_streams_released(&self) -> bool {
        self.open_streams.lock().unwrap().iter().all(|tx| tx.is_closed())
    }

    fn record(&self, call: Call, request: &ProviderRequest) {
        self.calls.lock().unwrap().push(call);
        self.request_sizes.lock().unwrap().push(request.messages.len());
    }

    fn next_turn(&self, keep_tool_turns: bool) -> Turn {
        let mut turns = self.turns.lock().unwrap();
        let turn = turns
            .front()
            .cloned()
            .unwrap_or_else(|| panic!("ScriptedProvider: script exhausted"));
        if !(keep_tool_turns && matches!(turn, Turn::Tools { .. })) {
            turns.pop_front();
        }
        turn
    }

    fn open(&self, deltas: Vec<DeltaItem>) -> DeltaStream {
        let (tx, stream) = DeltaStream::channel(deltas.len() + 1);
        for delta in deltas {
            let _ = tx.try_send(delta);
        }
        // Keeping the sender means the stream only ends when the reader
        // stops or the deltas say so.
        self.open_streams.lock().unwrap().push(tx);
        self.stream_opened.notify_one();
        stream
    }
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: None,
        model: "scripted".into(),
    }
}

fn split_lead(lead: &str) -> (String, String) {
    let mid = lead.len() / 2;
    let mid = (mid..=lead.len())
        .find(|i| lead.is_char_boundary(*i))
        .unwrap_or(lead.len());
    (lead[..mid].to_string(), lead[mid..].to_string())
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.record(Call::Complete, &request);
        match self.next_turn(false) {
            Turn::Text(text) => Ok(response(Message::assistant(text))),
            Turn::Tools { lead, calls } => {
                Ok(response(Message::assistant(lead).with_tool_calls(calls)))
            }
            Turn::Fail(e) => Err(e),
            Turn::Interrupted => Err(ProviderError::StreamInterrupted("scripted".into())),
            Turn::Stall => std::future::pending().await,
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<DeltaStream, ProviderError> {
        self.record(Call::Stream, &request);
        let deltas = match self.next_turn(true) {
            Turn::Text(text) => text
                .split_inclusive(' ')
                .map(|w| Ok(StreamDelta::text(w)))
                .chain(std::iter::once(Ok(StreamDelta::done())))
                .collect(),
            Turn::Tools { lead, calls } => {
                let (a, b) = split_lead(&lead);
                let mut deltas = vec![Ok(StreamDelta::text(a)), Ok(StreamDelta::text(b))];
                for (i, call) in calls.iter().enumerate() {
                    let index = i as u32;
                    deltas.push(Ok(StreamDelta::tool_call(ToolCallDelta::start(
                        index, &call.id, &call.name,
                    ))));
                    deltas.push(Ok(StreamDelta::tool_call(ToolCallDelta::arguments(
                        index,
                        &call.arguments,
                    ))));
                }
                deltas.push(Ok(StreamDelta::done()));
                deltas
            }
            Turn::Fail(e) => return Err(e),
            Turn::Interrupted => vec![
                Ok(StreamDelta::text("partial ")),
                Err(ProviderError::StreamInterrupted("connection reset".into())),
            ],
            Turn::Stall => vec![Ok(StreamDelta::text("thinking "))],
        };
        Ok(self.open(deltas))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}

pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
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
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
        Ok(ToolOutput::text(text))
    }
}

/// Signals when it starts, then never finishes.
pub struct BlockingTool {
    started: Arc<Notify>,
}

impl BlockingTool {
    pub fn new(started: Arc<Notify>) -> Self {
        Self { started }
    }
}

#[async_trait]
impl Tool for BlockingTool {
    fn name(&self) -> &str {
        "block"
    }

    fn description(&self) -> &str {
        "Never returns"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.started.notify_one();
        std::future::pending().await
    }
}
