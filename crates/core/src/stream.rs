//! Streamed responses: deltas, the scoped stream handle, and delta merging.
//!
//! A streamed completion arrives as a sequence of [`StreamDelta`]s read from
//! a [`DeltaStream`]. The stream owns the transport: dropping or closing it
//! stops the producer task, so every exit path releases the connection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};
use crate::provider::Usage;

/// An incremental fragment of an in-progress assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Partial content text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial or complete tool call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,

    /// End-of-stream marker
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final delta)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamDelta {
    /// A plain content fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A delta carrying a single tool call fragment.
    pub fn tool_call(fragment: ToolCallDelta) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Self::default()
        }
    }

    /// The end-of-stream marker.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }

    pub fn carries_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A fragment of one tool call. Fragments with the same `index` belong to
/// the same call; `id` and `name` usually arrive once, `arguments` in pieces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    /// The opening fragment of a call: id and name, no arguments yet.
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        }
    }

    /// A continuation fragment carrying more argument text.
    pub fn arguments(index: u32, arguments: impl Into<String>) -> Self {
        Self {
            index,
            arguments: Some(arguments.into()),
            ..Self::default()
        }
    }
}

type DeltaItem = std::result::Result<StreamDelta, ProviderError>;

/// A live stream of deltas from the model backend.
///
/// This is a scoped resource. [`DeltaStream::close`] (also run on drop)
/// closes the channel and aborts the producer task, which drops the
/// underlying HTTP response.
pub struct DeltaStream {
    rx: mpsc::Receiver<DeltaItem>,
    producer: Option<AbortHandle>,
    closed: bool,
}

impl DeltaStream {
    /// Wrap a receiver fed by some producer.
    pub fn new(rx: mpsc::Receiver<DeltaItem>) -> Self {
        Self {
            rx,
            producer: None,
            closed: false,
        }
    }

    /// Create a bounded channel and the stream reading from it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<DeltaItem>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }

    /// Attach the producer task so closing the stream also stops it.
    pub fn with_producer(mut self, handle: AbortHandle) -> Self {
        self.producer = Some(handle);
        self
    }

    /// A finished stream replaying the given deltas.
    pub fn from_deltas(deltas: impl IntoIterator<Item = StreamDelta>) -> Self {
        let deltas: Vec<_> = deltas.into_iter().collect();
        let (tx, stream) = Self::channel(deltas.len());
        for delta in deltas {
            // Capacity equals the number of deltas, so this never fills up.
            let _ = tx.try_send(Ok(delta));
        }
        stream
    }

    /// Receive the next delta. `None` means the transport is exhausted or
    /// the stream has been closed.
    pub async fn recv(&mut self) -> Option<DeltaItem> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Release the stream. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rx.close();
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
        trace!("Delta stream released");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for DeltaStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeltaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaStream")
            .field("closed", &self.closed)
            .field("has_producer", &self.producer.is_some())
            .finish()
    }
}

/// Merges a delta sequence, in arrival order, into one assistant message.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    content: String,
    calls: BTreeMap<u32, PartialCall>,
    usage: Option<Usage>,
    deltas_seen: usize,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one delta.
    pub fn push(&mut self, delta: &StreamDelta) {
        self.deltas_seen += 1;

        if let Some(text) = &delta.content {
            self.content.push_str(text);
        }

        for fragment in &delta.tool_calls {
            let call = self.calls.entry(fragment.index).or_default();
            if let Some(id) = &fragment.id {
                call.id = id.clone();
            }
            if let Some(name) = &fragment.name {
                call.name = name.clone();
            }
            if let Some(args) = &fragment.arguments {
                call.arguments.push_str(args);
            }
        }

        if delta.usage.is_some() {
            self.usage = delta.usage.clone();
        }
    }

    pub fn deltas_seen(&self) -> usize {
        self.deltas_seen
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Build the assistant message. Calls are ordered by fragment index;
    /// a call that never received an id gets `call_<index>`.
    pub fn into_message(self) -> Message {
        let tool_calls = self
            .calls
            .into_iter()
            .map(|(index, call)| ToolCall {
                id: if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                },
                name: call.name,
                arguments: call.arguments,
            })
            .collect();

        Message::assistant(self.content).with_tool_calls(tool_calls)
    }
}
