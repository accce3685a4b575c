//! Tagged error kinds for the orchestrator.
//!
//! Every boundary converts one of these into a user-facing message; nothing
//! downstream collapses a structured record into a bare `bool`.

use thiserror::Error;

/// An agent/model transport fault's reported reason, carried verbatim rather
/// than re-derived from a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Ok,
    MaxTurns,
    Timeout,
    InternalError,
    SessionLocked,
}

impl ExitReason {
    /// Transient faults are worth an automatic retry with backoff.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::SessionLocked | Self::InternalError)
    }
}

#[derive(Debug, Error)]
pub enum OrchError {
    #[error("user error: {0}")]
    UserError(String),

    #[error("validation failed at stage '{stage}', field '{field}': {message}")]
    ValidationError {
        stage: &'static str,
        field: String,
        message: String,
    },

    #[error("confirmation required: {summary}")]
    ConfirmationRequired { summary: String },

    #[error("storage fault in '{op}': {source}")]
    StorageFault {
        op: &'static str,
        #[source]
        source: statestore::StoreError,
    },

    #[error("memory fault: {0}")]
    MemoryFault(#[from] memorycore::MemoryError),

    #[error("agent fault: {exit_reason:?}")]
    AgentFault { exit_reason: ExitReason },

    #[error("turn budget exhausted after {retries} retries")]
    BudgetExhausted { retries: u32 },

    #[error("context window critical: {used_pct}% used")]
    ContextCritical { used_pct: u8 },

    #[error("escalated: {reason}")]
    Escalation { reason: String },

    #[error("configuration error: key '{key}' expected {expected}, got '{actual}'")]
    Config {
        key: &'static str,
        expected: &'static str,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, OrchError>;

impl OrchError {
    /// Process exit code for the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchError::UserError(_) => 1,
            OrchError::ValidationError { .. } | OrchError::Config { .. } => 2,
            OrchError::StorageFault { .. } => 3,
            OrchError::AgentFault { .. } | OrchError::MemoryFault(_) => 4,
            OrchError::BudgetExhausted { .. } | OrchError::ContextCritical { .. } | OrchError::Escalation { .. } => 5,
            OrchError::ConfirmationRequired { .. } => 0,
        }
    }
}

impl From<statestore::StoreError> for OrchError {
    fn from(source: statestore::StoreError) -> Self {
        match source {
            statestore::StoreError::NotFound { id, .. } => OrchError::UserError(format!("not found: {id}")),
            statestore::StoreError::InvalidArgument { reason, .. } => OrchError::UserError(reason),
            other => OrchError::StorageFault { op: "statestore", source: other },
        }
    }
}
