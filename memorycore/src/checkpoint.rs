//! Checkpoint creation and restore.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::tiers::WorkingMemory;

/// What caused a checkpoint to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointTrigger {
    /// Usage crossed 70% upward.
    Threshold,
    /// A fixed operation counter elapsed.
    OperationCount,
    /// A fixed time interval elapsed.
    Interval,
    /// Explicitly requested.
    Manual,
}

/// Self-contained serialization of working memory plus the id of the last
/// persisted interaction — the unit restore reconstructs from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointArtifact {
    pub working_memory: WorkingMemory,
    pub last_interaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub created_at: i64,
    pub trigger: CheckpointTrigger,
    pub artifact: CheckpointArtifact,
}

/// File-backed checkpoint registry, one JSON file per checkpoint.
pub struct CheckpointStore {
    base_path: PathBuf,
}

impl CheckpointStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|source| MemoryError::Io {
            op: "create checkpoint directory",
            source,
        })?;
        Ok(Self { base_path })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.json"))
    }

    pub fn create(
        &self,
        session_id: impl Into<String>,
        trigger: CheckpointTrigger,
        working_memory: WorkingMemory,
        last_interaction_id: impl Into<String>,
    ) -> Result<Checkpoint> {
        let checkpoint = Checkpoint {
            id: Uuid::now_v7().to_string(),
            session_id: session_id.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            trigger,
            artifact: CheckpointArtifact {
                working_memory,
                last_interaction_id: last_interaction_id.into(),
            },
        };

        let content = serde_json::to_string_pretty(&checkpoint)?;
        fs::write(self.path_for(&checkpoint.id), content).map_err(|source| MemoryError::Io {
            op: "write checkpoint",
            source,
        })?;

        info!(checkpoint_id = %checkpoint.id, session_id = %checkpoint.session_id, ?trigger, "checkpoint created");
        Ok(checkpoint)
    }

    /// Restore the working memory and last-interaction pointer from a
    /// checkpoint id. Deterministic and idempotent: calling restore twice
    /// on the same id yields byte-identical artifacts.
    pub fn restore(&self, id: &str) -> Result<CheckpointArtifact> {
        let path = self.path_for(id);
        let content = fs::read_to_string(&path).map_err(|_| MemoryError::CheckpointNotFound(id.to_string()))?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        Ok(checkpoint.artifact)
    }

    pub fn get(&self, id: &str) -> Result<Checkpoint> {
        let path = self.path_for(id);
        let content = fs::read_to_string(&path).map_err(|_| MemoryError::CheckpointNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>> {
        let mut out = Vec::new();
        let entries = fs::read_dir(&self.base_path).map_err(|source| MemoryError::Io {
            op: "list checkpoints",
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| MemoryError::Io {
                op: "list checkpoints",
                source,
            })?;
            let content = fs::read_to_string(entry.path()).map_err(|source| MemoryError::Io {
                op: "read checkpoint",
                source,
            })?;
            let checkpoint: Checkpoint = serde_json::from_str(&content)?;
            if checkpoint.session_id == session_id {
                out.push(checkpoint);
            }
        }
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::{Operation, OperationKind};
    use tempfile::TempDir;

    fn sample_working_memory() -> WorkingMemory {
        let mut wm = WorkingMemory::new(10, 0);
        wm.push(Operation {
            kind: OperationKind::Prompt,
            token_count: 5,
            timestamp: 1,
            body: "hello".into(),
        });
        wm
    }

    #[test]
    fn restore_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();
        let checkpoint = store
            .create("session-1", CheckpointTrigger::Manual, sample_working_memory(), "interaction-9")
            .unwrap();

        let first = store.restore(&checkpoint.id).unwrap();
        let second = store.restore(&checkpoint.id).unwrap();

        assert_eq!(first.last_interaction_id, second.last_interaction_id);
        assert_eq!(first.working_memory.len(), second.working_memory.len());
    }

    #[test]
    fn missing_checkpoint_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();
        assert!(store.restore("does-not-exist").is_err());
    }

    #[test]
    fn list_filters_by_session() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();
        store
            .create("session-1", CheckpointTrigger::Threshold, sample_working_memory(), "i-1")
            .unwrap();
        store
            .create("session-2", CheckpointTrigger::Manual, sample_working_memory(), "i-2")
            .unwrap();

        let session_1_checkpoints = store.list("session-1").unwrap();
        assert_eq!(session_1_checkpoints.len(), 1);
    }
}
