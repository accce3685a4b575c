//! Event vocabulary for orchestrator activity streaming: every stage
//! of the iteration loop emits one of these so a TUI, logger, or test
//! harness can observe progress without polling StatePort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The vocabulary of orchestrator activity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrchEvent {
    /// A prompt has been assembled (milestone context + task description +
    /// recent interactions) but not yet sent.
    PromptPrepared { task_id: String, session_id: String, iteration: u32, prompt_chars: usize },
    /// The prompt has been sent to the `AgentPort`.
    PromptSent { task_id: String, session_id: String, iteration: u32, max_turns: u32 },
    /// The agent's response has been received.
    ResponseReceived { task_id: String, session_id: String, iteration: u32, turns_used: u32, windowed_tokens: u64 },
    /// The validation pipeline has finished all five stages.
    ValidationDone { task_id: String, iteration: u32, quality: f32, confidence: f32 },
    /// The decision engine has produced a decision.
    DecisionMade { task_id: String, iteration: u32, decision: String },
    /// A breakpoint fired; the task pauses until it is resolved.
    BreakpointTriggered { task_id: String, reason: String },
    /// The session was refreshed (orange-zone context window).
    SessionRefreshed { task_id: String, old_session_id: String, new_session_id: String },
    /// A checkpoint of working memory was created.
    CheckpointCreated { task_id: String, session_id: String, trigger: String },
    /// The task's iteration loop paused (breakpoint or operator request).
    Paused { task_id: String, reason: String },
    /// The task's iteration loop resumed after a pause.
    Resumed { task_id: String },
    /// A recoverable error occurred.
    Error { task_id: String, context: String, message: String },
    /// A non-fatal anomaly occurred.
    Warning { task_id: String, context: String, message: String },
}

impl OrchEvent {
    pub fn task_id(&self) -> &str {
        match self {
            OrchEvent::PromptPrepared { task_id, .. }
            | OrchEvent::PromptSent { task_id, .. }
            | OrchEvent::ResponseReceived { task_id, .. }
            | OrchEvent::ValidationDone { task_id, .. }
            | OrchEvent::DecisionMade { task_id, .. }
            | OrchEvent::BreakpointTriggered { task_id, .. }
            | OrchEvent::SessionRefreshed { task_id, .. }
            | OrchEvent::CheckpointCreated { task_id, .. }
            | OrchEvent::Paused { task_id, .. }
            | OrchEvent::Resumed { task_id, .. }
            | OrchEvent::Error { task_id, .. }
            | OrchEvent::Warning { task_id, .. } => task_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            OrchEvent::PromptPrepared { .. } => "PromptPrepared",
            OrchEvent::PromptSent { .. } => "PromptSent",
            OrchEvent::ResponseReceived { .. } => "ResponseReceived",
            OrchEvent::ValidationDone { .. } => "ValidationDone",
            OrchEvent::DecisionMade { .. } => "DecisionMade",
            OrchEvent::BreakpointTriggered { .. } => "BreakpointTriggered",
            OrchEvent::SessionRefreshed { .. } => "SessionRefreshed",
            OrchEvent::CheckpointCreated { .. } => "CheckpointCreated",
            OrchEvent::Paused { .. } => "Paused",
            OrchEvent::Resumed { .. } => "Resumed",
            OrchEvent::Error { .. } => "Error",
            OrchEvent::Warning { .. } => "Warning",
        }
    }

    /// A terminal event closes out the task's log file in the logger.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchEvent::DecisionMade { decision, .. } if decision == "PROCEED" || decision == "ABORT")
    }
}

/// A timestamped event log entry for file persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: OrchEvent,
}

impl EventLogEntry {
    pub fn new(event: OrchEvent) -> Self {
        Self { timestamp: Utc::now(), event }
    }
}
