//! Domain event system: decoupled observation of orchestrator runs.
//!
//! Events are published when something interesting happens in a session.
//! Observers subscribe to react without coupling to the loop itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new round is about to call the model backend
    RoundStarted {
        conversation_id: String,
        step: u32,
        mode: String,
        timestamp: DateTime<Utc>,
    },

    /// The model backend produced a complete assistant message
    ResponseGenerated {
        conversation_id: String,
        model: String,
        tokens_used: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A streamed response turned out to be tool-call shaped and was dropped
    StreamAbandoned {
        conversation_id: String,
        deltas_consumed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A session reached a terminal status
    SessionFinished {
        conversation_id: String,
        status: String,
        steps: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
