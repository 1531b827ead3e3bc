//! The tool-calling agent loop.
//!
//! Each round follows an **Ask → Classify → Act → Commit** cycle:
//!
//! 1. **Ask** the provider for the next assistant message
//! 2. **Classify** a streamed response early: text streams through, a
//!    tool-call shaped stream is dropped and re-asked in buffered mode
//! 3. **Act** on tool calls by dispatching them concurrently
//! 4. **Commit** the assistant message and its tool results together
//!
//! The loop ends when the model answers without tools, the step budget is
//! spent, the provider fails, or the run is cancelled.

pub mod classifier;
pub mod dispatch;
pub mod loop_runner;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use classifier::{StreamVerdict, classify};
pub use dispatch::ToolDispatcher;
pub use loop_runner::{AgentLoop, run_session};
pub use stream_event::AgentStreamEvent;
pub use tokio_util::sync::CancellationToken;
