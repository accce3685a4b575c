use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointTrigger {
    Threshold,
    Interval,
    OperationCount,
    Manual,
}

impl CheckpointTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointTrigger::Threshold => "THRESHOLD",
            CheckpointTrigger::Interval => "INTERVAL",
            CheckpointTrigger::OperationCount => "OPERATION_COUNT",
            CheckpointTrigger::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "THRESHOLD" => Some(CheckpointTrigger::Threshold),
            "INTERVAL" => Some(CheckpointTrigger::Interval),
            "OPERATION_COUNT" => Some(CheckpointTrigger::OperationCount),
            "MANUAL" => Some(CheckpointTrigger::Manual),
            _ => None,
        }
    }
}

/// The registry row for a memory-core checkpoint: the state store records
/// *that* a checkpoint exists and where its artifact lives, but treats the
/// artifact itself as opaque bytes. The memory core owns the serialization
/// format and the directory tree of checkpoint files; no other component
/// may write there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: String,
    pub session_id: String,
    pub created_at: i64,
    pub trigger: CheckpointTrigger,
    /// Opaque pointer to the artifact (e.g. a memorycore checkpoint id).
    pub artifact_ref: String,
}
