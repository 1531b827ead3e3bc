//! # ToolLoop Core
//!
//! Domain types, traits, and error definitions for the ToolLoop agent
//! orchestrator. This crate has **no transport dependencies**: it defines
//! the domain model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`message`]: the append-only conversation transcript
//! - [`provider`]: the model backend capability (buffered or streamed)
//! - [`stream`]: stream deltas, the scoped [`DeltaStream`] handle and the
//!   delta accumulator
//! - [`tool`]: the tool capability and its registry
//! - [`session`]: session state and terminal statuses
//! - [`change_source`]: the collaborator that supplies review input
//! - [`event`]: domain events for decoupled observers

pub mod change_source;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use change_source::ChangeSource;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, Role, ToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseMode};
pub use session::{Session, SessionStatus};
pub use stream::{DeltaAccumulator, DeltaStream, StreamDelta, ToolCallDelta};
pub use tool::{Tool, ToolOutput, ToolRegistry, ToolResult};
