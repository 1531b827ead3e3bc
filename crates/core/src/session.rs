//! Session state for one orchestrator run.

use serde::{Deserialize, Serialize};

use crate::message::Conversation;

/// Where a session stands. Every state except `Running` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    /// The model produced a final answer with no tool calls.
    Completed,
    /// The step budget ran out while the model still wanted tools.
    MaxStepsExceeded,
    /// The model backend failed; the transcript holds every committed round.
    Failed { reason: String },
    /// The external cancellation signal fired.
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Short label for logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::MaxStepsExceeded => "max_steps_exceeded",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// One orchestrator run: its transcript, progress, and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub conversation: Conversation,
    step_count: u32,
    max_steps: u32,
    status: SessionStatus,
}

impl Session {
    pub fn new(conversation: Conversation, max_steps: u32) -> Self {
        Self {
            conversation,
            step_count: 0,
            max_steps,
            status: SessionStatus::Running,
        }
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Whether the step budget is used up.
    pub fn budget_exhausted(&self) -> bool {
        self.step_count >= self.max_steps
    }

    /// Record one completed round.
    pub fn complete_round(&mut self) {
        debug_assert!(self.is_running(), "round completed on a finished session");
        self.step_count += 1;
    }

    /// Move to a terminal status. Returns `false` (and changes nothing) if
    /// the session has already finished or `status` is `Running`.
    pub fn finish(&mut self, status: SessionStatus) -> bool {
        if !self.is_running() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// The content of the last assistant message, if any.
    pub fn final_answer(&self) -> Option<&str> {
        self.conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::Assistant)
            .map(|m| m.content.as_str())
    }
}
