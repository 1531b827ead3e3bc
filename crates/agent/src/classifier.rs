//! Streaming classifier: decides from the head of a response stream whether
//! the model is asking for tools.
//!
//! Deltas are consumed one at a time. The first delta carrying a tool-call
//! fragment ends classification with a positive verdict and the stream is
//! released on the spot; the caller then re-asks in buffered mode. A stream
//! that ends without any fragment yields the merged message as the answer.

use toolloop_core::error::ProviderError;
use toolloop_core::message::Message;
use toolloop_core::provider::Usage;
use toolloop_core::stream::{DeltaAccumulator, DeltaStream, StreamDelta};
use tracing::{debug, trace};

/// The outcome of classifying one stream.
#[derive(Debug)]
pub struct StreamVerdict {
    /// Whether a tool-call fragment was seen.
    pub has_tool_calls: bool,

    /// How many deltas were read before deciding.
    pub deltas_consumed: usize,

    accumulated: DeltaAccumulator,
}

impl StreamVerdict {
    /// Token usage reported by the stream, if any.
    pub fn usage(&self) -> Option<&Usage> {
        self.accumulated.usage()
    }

    /// The merged assistant message. Complete only when `has_tool_calls`
    /// is false; otherwise it holds whatever arrived before the verdict.
    pub fn into_message(self) -> Message {
        self.accumulated.into_message()
    }
}

/// Classify a stream, calling `on_delta` for every delta that is read before
/// a tool-call fragment shows up.
///
/// The stream is always closed when this returns `Ok`. A transport error is
/// returned as-is and also releases the stream.
pub async fn classify<F>(
    stream: &mut DeltaStream,
    mut on_delta: F,
) -> Result<StreamVerdict, ProviderError>
where
    F: FnMut(&StreamDelta),
{
    let mut accumulated = DeltaAccumulator::new();

    loop {
        let delta = match stream.recv().await {
            Some(Ok(delta)) => delta,
            Some(Err(e)) => {
                stream.close();
                return Err(e);
            }
            // Producer finished without an explicit done marker
            None => break,
        };

        accumulated.push(&delta);
        trace!(
            deltas = accumulated.deltas_seen(),
            tool_fragment = delta.carries_tool_calls(),
            "Classifier read delta"
        );

        if delta.carries_tool_calls() {
            stream.close();
            debug!(
                deltas_consumed = accumulated.deltas_seen(),
                "Tool-call fragment in stream"
            );
            return Ok(StreamVerdict {
                has_tool_calls: true,
                deltas_consumed: accumulated.deltas_seen(),
                accumulated,
            });
        }

        on_delta(&delta);

        if delta.done {
            break;
        }
    }

    stream.close();
    Ok(StreamVerdict {
        has_tool_calls: false,
        deltas_consumed: accumulated.deltas_seen(),
        accumulated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolloop_core::stream::ToolCallDelta;

    fn text_text_tool() -> Vec<StreamDelta> {
        vec![
            StreamDelta::text("Let me "),
            StreamDelta::text("check. "),
            StreamDelta::tool_call(ToolCallDelta::start(0, "call_1", "web_search")),
            StreamDelta::tool_call(ToolCallDelta::arguments(0, "{\"query\":\"x\"}")),
            StreamDelta::done(),
        ]
    }

    #[tokio::test]
    async fn plain_text_stream_is_final() {
        let mut stream = DeltaStream::from_deltas([
            StreamDelta::text("2 + 2 "),
            StreamDelta::text("= 4"),
            StreamDelta::done(),
        ]);
        let mut seen = Vec::new();

        let verdict = classify(&mut stream, |d| seen.extend(d.content.clone()))
            .await
            .unwrap();

        assert!(!verdict.has_tool_calls);
        assert_eq!(verdict.deltas_consumed, 3);
        assert!(stream.is_closed());
        assert_eq!(seen, ["2 + 2 ", "= 4"]);
        assert_eq!(verdict.into_message().content, "2 + 2 = 4");
    }

    #[tokio::test]
    async fn stops_at_first_tool_fragment() {
        let mut stream = DeltaStream::from_deltas(text_text_tool());
        let mut forwarded = 0;

        let verdict = classify(&mut stream, |_| forwarded += 1).await.unwrap();

        assert!(verdict.has_tool_calls);
        assert_eq!(verdict.deltas_consumed, 3);
        assert_eq!(forwarded, 2);
        assert!(stream.is_closed());
    }

    #[tokio::test]
    async fn verdict_is_stable_on_replay() {
        let mut first = DeltaStream::from_deltas(text_text_tool());
        let mut second = DeltaStream::from_deltas(text_text_tool());

        let a = classify(&mut first, |_| {}).await.unwrap();
        let b = classify(&mut second, |_| {}).await.unwrap();

        assert_eq!(a.has_tool_calls, b.has_tool_calls);
        assert_eq!(a.deltas_consumed, b.deltas_consumed);
    }

    #[tokio::test]
    async fn end_of_channel_counts_as_end_of_stream() {
        let mut stream = DeltaStream::from_deltas([StreamDelta::text("no done marker")]);
        let verdict = classify(&mut stream, |_| {}).await.unwrap();
        assert!(!verdict.has_tool_calls);
        assert_eq!(verdict.deltas_consumed, 1);
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_answer() {
        let mut stream = DeltaStream::from_deltas(Vec::new());
        let verdict = classify(&mut stream, |_| {}).await.unwrap();
        assert!(!verdict.has_tool_calls);
        assert_eq!(verdict.deltas_consumed, 0);
        assert_eq!(verdict.into_message().content, "");
    }

    #[tokio::test]
    async fn transport_error_propagates_and_releases() {
        let (tx, mut stream) = DeltaStream::channel(4);
        tx.send(Ok(StreamDelta::text("partial"))).await.unwrap();
        tx.send(Err(ProviderError::StreamInterrupted("connection reset".into())))
            .await
            .unwrap();

        let err = classify(&mut stream, |_| {}).await.unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
        assert!(stream.is_closed());
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn usage_is_carried_through() {
        let mut stream = DeltaStream::from_deltas([
            StreamDelta::text("ok"),
            StreamDelta {
                done: true,
                usage: Some(Usage {
                    prompt_tokens: 3,
                    completion_tokens: 1,
                    total_tokens: 4,
                }),
                ..StreamDelta::default()
            },
        ]);
        let verdict = classify(&mut stream, |_| {}).await.unwrap();
        assert_eq!(verdict.usage().map(|u| u.total_tokens), Some(4));
    }
}
