//! Tool dispatch: runs the tool calls of one assistant message.
//!
//! Every call produces exactly one [`ToolResult`]. Unknown tools, bad
//! arguments, tool errors, and timeouts all become failed results that are
//! fed back to the model; nothing here aborts a session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use toolloop_core::error::ToolError;
use toolloop_core::event::{DomainEvent, EventBus};
use toolloop_core::message::ToolCall;
use toolloop_core::tool::{ToolRegistry, ToolResult};
use tracing::{debug, warn};

pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, timeout: Duration, event_bus: Arc<EventBus>) -> Self {
        Self {
            tools,
            timeout,
            event_bus,
        }
    }

    /// Run all calls concurrently. Results come back in call order.
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        debug!(tool_count = calls.len(), "Dispatching tool calls");
        join_all(calls.iter().map(|call| self.dispatch_one(call))).await
    }

    /// Run a single call.
    pub async fn dispatch_one(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = self.execute(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if result.failed {
            warn!(
                tool = %call.name,
                call_id = %call.id,
                error = result.error_detail.as_deref().unwrap_or_default(),
                "Tool call failed"
            );
        } else {
            debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool call succeeded");
        }

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: !result.failed,
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::failure(&call.id, ToolError::NotFound(call.name.clone()).to_string());
        };

        let arguments = match call.parse_arguments() {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(other) => {
                let err = ToolError::InvalidArguments(format!(
                    "expected a JSON object for '{}', got {other}",
                    call.name
                ));
                return ToolResult::failure(&call.id, err.to_string());
            }
            Err(e) => {
                let err = ToolError::InvalidArguments(format!(
                    "arguments for '{}' are not valid JSON: {e}",
                    call.name
                ));
                return ToolResult::failure(&call.id, err.to_string());
            }
        };

        match tokio::time::timeout(self.timeout, tool.execute(arguments)).await {
            Ok(Ok(output)) => ToolResult::success(&call.id, output),
            Ok(Err(e)) => ToolResult::failure(&call.id, e.to_string()),
            Err(_) => {
                let err = ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                };
                ToolResult::failure(&call.id, err.to_string())
            }
        }
    }
}
