//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toolloop_config::AgentSettings;
use toolloop_core::error::{Error, ProviderError};
use toolloop_core::event::{DomainEvent, EventBus};
use toolloop_core::message::{Conversation, Message};
use toolloop_core::provider::{Provider, ProviderRequest, ResponseMode, ToolDefinition};
use toolloop_core::session::{Session, SessionStatus};
use toolloop_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::dispatch::ToolDispatcher;
use crate::stream_event::AgentStreamEvent;

/// Why a round stopped before it could be committed.
#[derive(Debug)]
enum Interrupt {
    Cancelled,
    Backend(ProviderError),
}

impl From<ProviderError> for Interrupt {
    fn from(e: ProviderError) -> Self {
        Self::Backend(e)
    }
}

/// The messages one round produced, not yet part of the transcript.
struct StagedRound {
    messages: Vec<Message>,
    had_tool_calls: bool,
}

/// The core agent loop that orchestrates LLM calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use (empty lets the provider pick its default)
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Maximum rounds per session
    max_steps: u32,

    /// Requested delivery mode
    response_mode: ResponseMode,

    /// Per-call tool timeout
    tool_timeout: Duration,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Optional live observer
    observer: Option<mpsc::UnboundedSender<AgentStreamEvent>>,
}

impl AgentLoop {
    /// Create a new agent loop with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let settings = AgentSettings::default();
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            max_steps: settings.max_steps,
            response_mode: settings.response_mode,
            tool_timeout: Duration::from_secs(settings.tool_timeout_secs),
            event_bus: Arc::new(EventBus::default()),
            observer: None,
        }
    }

    /// Apply the `[agent]` section of the configuration.
    pub fn with_settings(self, settings: &AgentSettings) -> Self {
        self.with_max_steps(settings.max_steps)
            .with_response_mode(settings.response_mode)
            .with_tool_timeout(Duration::from_secs(settings.tool_timeout_secs))
    }

    /// Set the maximum number of rounds.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Publish domain events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Forward live events (chunks, tool activity, completion) to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<AgentStreamEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The mode rounds actually use: streaming only when both requested and
    /// supported by the provider.
    pub fn effective_mode(&self) -> ResponseMode {
        match self.response_mode {
            ResponseMode::Streamed if self.provider.supports_streaming() => ResponseMode::Streamed,
            _ => ResponseMode::Buffered,
        }
    }

    /// Drive `conversation` until the model answers without tools, the step
    /// budget runs out, the backend fails, or `cancel` fires.
    ///
    /// Errors only for unusable input; every other outcome is reported in
    /// the returned session's status.
    pub async fn run(
        &self,
        conversation: Conversation,
        cancel: CancellationToken,
    ) -> Result<Session, Error> {
        if !conversation.has_prompt() {
            return Err(Error::InvalidInput(
                "conversation needs at least one system or user message".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(Error::InvalidInput("max_steps must be at least 1".into()));
        }

        let mode = self.effective_mode();
        let mut session = Session::new(conversation, self.max_steps);
        let conversation_id = session.conversation.id.to_string();
        let definitions = self.tools.definitions();

        info!(
            conversation_id = %conversation_id,
            messages = session.conversation.len(),
            max_steps = self.max_steps,
            mode = %mode,
            tools = ?self.tools.names(),
            "Starting session"
        );

        while session.is_running() {
            if cancel.is_cancelled() {
                session.finish(SessionStatus::Cancelled);
                break;
            }

            let step = session.step_count() + 1;
            debug!(conversation_id = %conversation_id, step, "Agent loop round");
            self.event_bus.publish(DomainEvent::RoundStarted {
                conversation_id: conversation_id.clone(),
                step,
                mode: mode.to_string(),
                timestamp: Utc::now(),
            });

            match self
                .round(&session.conversation, &definitions, mode, &cancel)
                .await
            {
                Ok(staged) => {
                    session.conversation.extend(staged.messages);
                    session.complete_round();

                    if !staged.had_tool_calls {
                        session.finish(SessionStatus::Completed);
                    } else if session.budget_exhausted() {
                        warn!(
                            conversation_id = %conversation_id,
                            steps = session.step_count(),
                            "Max steps reached while the model still wants tools"
                        );
                        session.finish(SessionStatus::MaxStepsExceeded);
                    }
                }
                Err(Interrupt::Cancelled) => {
                    info!(conversation_id = %conversation_id, step, "Session cancelled");
                    session.finish(SessionStatus::Cancelled);
                }
                Err(Interrupt::Backend(e)) => {
                    warn!(conversation_id = %conversation_id, step, error = %e, "Provider failed");
                    self.emit(AgentStreamEvent::Error {
                        message: e.to_string(),
                    });
                    session.finish(SessionStatus::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            conversation_id = %conversation_id,
            status = %session.status(),
            steps = session.step_count(),
            messages = session.conversation.len(),
            "Session finished"
        );
        self.event_bus.publish(DomainEvent::SessionFinished {
            conversation_id: conversation_id.clone(),
            status: session.status().label().into(),
            steps: session.step_count(),
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::Done {
            conversation_id,
            status: session.status().label().into(),
            steps: session.step_count(),
        });

        Ok(session)
    }

    /// One model invocation plus its tool dispatches. Nothing is written to
    /// the transcript here; the caller commits the staged messages.
    async fn round(
        &self,
        conversation: &Conversation,
        definitions: &[ToolDefinition],
        mode: ResponseMode,
        cancel: &CancellationToken,
    ) -> Result<StagedRound, Interrupt> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: conversation.messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: definitions.to_vec(),
        };

        let conversation_id = conversation.id.to_string();
        let assistant = self
            .invoke(request, mode, &conversation_id, cancel)
            .await?;

        if !assistant.has_tool_calls() {
            return Ok(StagedRound {
                messages: vec![assistant],
                had_tool_calls: false,
            });
        }

        let calls = assistant.tool_calls.clone();
        for call in &calls {
            self.emit(AgentStreamEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.parse_arguments().unwrap_or(serde_json::Value::Null),
            });
        }

        let dispatcher = ToolDispatcher::new(
            self.tools.clone(),
            self.tool_timeout,
            self.event_bus.clone(),
        );
        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
            results = dispatcher.dispatch(&calls) => results,
        };

        let mut messages = Vec::with_capacity(results.len() + 1);
        messages.push(assistant);
        for (call, result) in calls.iter().zip(results) {
            self.emit(AgentStreamEvent::ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                output: result.content.clone(),
                success: !result.failed,
            });
            messages.push(result.into_message());
        }

        Ok(StagedRound {
            messages,
            had_tool_calls: true,
        })
    }

    /// Get one complete assistant message from the provider.
    ///
    /// In streamed mode the head of the stream is classified first; a
    /// tool-call shaped stream is dropped, partial text included, and the
    /// request is repeated in buffered mode.
    async fn invoke(
        &self,
        request: ProviderRequest,
        mode: ResponseMode,
        conversation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Message, Interrupt> {
        if mode == ResponseMode::Streamed {
            let mut stream = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
                opened = self.provider.stream(request.clone()) => opened?,
            };

            let verdict = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
                verdict = classify(&mut stream, |delta| {
                    if let Some(content) = &delta.content {
                        self.emit(AgentStreamEvent::Chunk { content: content.clone() });
                    }
                }) => verdict?,
            };
            drop(stream);

            if !verdict.has_tool_calls {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation_id.to_string(),
                    model: self.model_label(),
                    tokens_used: verdict.usage().map_or(0, |u| u.total_tokens),
                    tool_calls: 0,
                    timestamp: Utc::now(),
                });
                return Ok(verdict.into_message());
            }

            debug!(
                conversation_id,
                deltas_consumed = verdict.deltas_consumed,
                "Streamed response requests tools, restarting buffered"
            );
            self.event_bus.publish(DomainEvent::StreamAbandoned {
                conversation_id: conversation_id.to_string(),
                deltas_consumed: verdict.deltas_consumed,
                timestamp: Utc::now(),
            });
            self.emit(AgentStreamEvent::StreamRestarted {
                deltas_consumed: verdict.deltas_consumed,
            });
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
            response = self.provider.complete(request) => response?,
        };

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: conversation_id.to_string(),
            model: response.model.clone(),
            tokens_used: response.usage.as_ref().map_or(0, |u| u.total_tokens),
            tool_calls: response.message.tool_calls.len(),
            timestamp: Utc::now(),
        });

        Ok(response.message)
    }

    /// Streams do not echo the model back; name the requested one, or the
    /// provider when the request left the choice to it.
    fn model_label(&self) -> String {
        if self.model.is_empty() {
            self.provider.name().to_string()
        } else {
            self.model.clone()
        }
    }

    fn emit(&self, event: AgentStreamEvent) {
        if let Some(observer) = &self.observer {
            // A departed observer does not stop the session
            let _ = observer.send(event);
        }
    }
}

/// Run a session with default settings and no cancellation.
///
/// `initial_messages` must contain at least one system or user message and
/// `max_steps` must be at least 1.
pub async fn run_session(
    initial_messages: Vec<Message>,
    max_steps: u32,
    tools: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
) -> Result<Session, Error> {
    AgentLoop::new(provider, "", tools)
        .with_max_steps(max_steps)
        .run(
            Conversation::from_messages(initial_messages),
            CancellationToken::new(),
        )
        .await
}
