use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
    Refreshed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Refreshed => "REFRESHED",
            SessionStatus::Abandoned => "ABANDONED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(SessionStatus::Active),
            "COMPLETED" => Some(SessionStatus::Completed),
            "REFRESHED" => Some(SessionStatus::Refreshed),
            "ABANDONED" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

/// The unit of continuity with the implementer agent for a milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub milestone_id: Option<String>,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub status: SessionStatus,
    pub total_tokens: i64,
    pub total_turns: i64,
    pub summary: Option<String>,
    /// Last time this session's owning orchestrator task reported liveness.
    /// Backs the crash-recovery sweep (an orphaned ACTIVE session is one
    /// whose heartbeat has gone stale).
    pub last_heartbeat_at: i64,
}
