//! memorycore — multi-tier working/session/episodic memory with an adaptive
//! optimizer and checkpoint/resume, for keeping a small-context validator (or
//! orchestrator) within its context window.
//!
//! # Architecture
//!
//! ```text
//! <store_path>/
//! ├── episodic/
//! │   └── {doc_id}/versions.jsonl
//! └── checkpoints/
//!     └── {checkpoint_id}.json
//! ```
//!
//! Working memory lives only in-process; it is serialized into a checkpoint
//! artifact on threshold/interval/op-count/manual triggers and restored from
//! one deterministically.

pub mod checkpoint;
pub mod config;
pub mod context_window;
pub mod error;
pub mod episodic;
pub mod optimizer;
pub mod tiers;

pub use checkpoint::{Checkpoint, CheckpointArtifact, CheckpointStore, CheckpointTrigger};
pub use config::Config;
pub use context_window::{ContextWindowManager, Zone};
pub use error::{MemoryError, Result};
pub use episodic::EpisodicStore;
pub use optimizer::{Profile, ProfileName};
pub use tiers::{ArtifactEntry, Operation, OperationKind, SessionMemory, WorkingMemory};

use tracing::{debug, info, warn};

/// Coordinates the three memory tiers, the adaptive profile, and
/// checkpoint/restore for a single validator/orchestrator session.
pub struct MemoryCore {
    config: Config,
    profile: Profile,
    window: ContextWindowManager,
    working: WorkingMemory,
    session: SessionMemory,
    episodic: EpisodicStore,
    checkpoints: CheckpointStore,
    ops_since_checkpoint: usize,
}

impl MemoryCore {
    /// Open (or create) a memory core backed by `config.store_path`, selecting
    /// an optimizer [`Profile`] from `config.context_window`.
    pub fn open(config: Config) -> Result<Self> {
        let profile = Profile::for_window(config.context_window);
        let window = ContextWindowManager::new(config.context_window);
        let working = WorkingMemory::new(
            profile.max_operations,
            (config.context_window as f64 * profile.max_tokens_pct) as u32,
        );
        let episodic = EpisodicStore::open(config.store_path.join("episodic"))?;
        let checkpoints = CheckpointStore::open(config.store_path.join("checkpoints"))?;

        info!(profile = ?profile.name, context_window = config.context_window, "memory core opened");

        Ok(Self {
            config,
            profile,
            window,
            working,
            session: SessionMemory::new(),
            episodic,
            checkpoints,
            ops_since_checkpoint: 0,
        })
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn zone(&self) -> Zone {
        self.window.zone(self.working.total_tokens())
    }

    /// Record a new operation in working memory, evicting the oldest entries
    /// into the session tier as needed to stay within bounds.
    pub fn record_operation(&mut self, op: Operation) {
        self.session.record_tokens(op.token_count);
        let evicted = self.working.push(op);
        self.ops_since_checkpoint += 1;

        for op in evicted {
            self.session
                .push_summary(format!("[evicted {:?} @ {}] {}", op.kind, op.timestamp, truncate(&op.body, 200)));
        }
    }

    /// Apply the fixed optimization pipeline (Pruning, Artifact Registry,
    /// External Storage, Differential State, Summarization) and return the
    /// resulting context string. `already_described` names artifact paths
    /// whose full body has already been emitted this session, so a
    /// differential reference is used instead.
    pub fn build_context(&mut self, already_described: &[String]) -> Result<String> {
        self.working.prune_by_age(self.config.pruning_age);
        self.working.prune_validation_results(5);

        let mut sections = Vec::with_capacity(self.working.len());
        for op in self.working.iter() {
            let body = if op.body.len() > self.config.externalization_threshold {
                let pointer = self.episodic.externalize(&format!("op-{}", op.timestamp), op.body.clone())?;
                format!("[externalized -> {pointer}]")
            } else if let Some(path) = artifact_path(&op.body)
                && let Some(entry) = self.session.artifact_registry.get(path)
            {
                if already_described.iter().any(|p| p == path) {
                    format!("[unchanged since last mention: {path}]")
                } else {
                    format!("[{path} hash={} — {}]", entry.hash, entry.summary)
                }
            } else {
                op.body.clone()
            };
            sections.push(body);
        }

        let context = sections.join("\n---\n");
        debug!(zone = ?self.zone(), chars = context.len(), "context built");
        Ok(context)
    }

    /// Whether usage or the operation counter demands a checkpoint before the
    /// next outgoing call.
    pub fn needs_checkpoint(&self) -> Option<CheckpointTrigger> {
        if self.window.should_checkpoint(self.working.total_tokens(), &self.profile) {
            Some(CheckpointTrigger::Threshold)
        } else if self.ops_since_checkpoint >= self.profile.ckpt_every_ops {
            Some(CheckpointTrigger::OperationCount)
        } else {
            None
        }
    }

    /// Create a checkpoint of the current working memory and reset the
    /// operation counter.
    pub fn checkpoint(
        &mut self,
        session_id: impl Into<String>,
        trigger: CheckpointTrigger,
        last_interaction_id: impl Into<String>,
    ) -> Result<Checkpoint> {
        let checkpoint = self
            .checkpoints
            .create(session_id, trigger, self.working.clone(), last_interaction_id)?;
        self.ops_since_checkpoint = 0;
        Ok(checkpoint)
    }

    /// Restore working memory from a checkpoint id. Deterministic: repeated
    /// restores from the same checkpoint id leave working memory identical.
    pub fn restore(&mut self, checkpoint_id: &str) -> Result<String> {
        let artifact = self.checkpoints.restore(checkpoint_id)?;
        self.working = artifact.working_memory;
        self.ops_since_checkpoint = 0;
        Ok(artifact.last_interaction_id)
    }

    /// Register the current `(hash, summary)` of a file artifact for use by
    /// the Artifact Registry optimization.
    pub fn register_artifact(&mut self, path: impl Into<String>, hash: impl Into<String>, summary: impl Into<String>) {
        self.session.register_artifact(path, hash, summary);
    }

    /// Guard an outgoing call against the red zone, warning in yellow.
    pub fn guard_outgoing_call(&self) -> Result<Zone> {
        let zone = self.window.guard_outgoing_call(self.working.total_tokens())?;
        if zone == Zone::Yellow {
            warn!("context usage in yellow zone; pruning + registry will apply on next build");
        }
        Ok(zone)
    }

    pub fn session(&self) -> &SessionMemory {
        &self.session
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

/// Best-effort extraction of a file path from an operation body formatted as
/// `path: <body>` — used to key the artifact registry lookup.
fn artifact_path(body: &str) -> Option<&str> {
    body.split_once(':').map(|(path, _)| path.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn core(context_window: u32) -> (MemoryCore, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = Config {
            store_path: temp.path().to_path_buf(),
            context_window,
            ..Config::default()
        };
        (MemoryCore::open(config).unwrap(), temp)
    }

    #[test]
    fn small_window_selects_ultra_aggressive_profile() {
        let (mc, _temp) = core(2_000);
        assert_eq!(mc.profile().name, ProfileName::UltraAggressive);
    }

    #[test]
    fn eviction_moves_operations_into_session_summaries() {
        let (mut mc, _temp) = core(4_000);
        for i in 0..15 {
            mc.record_operation(Operation {
                kind: OperationKind::Prompt,
                token_count: 1,
                timestamp: i,
                body: format!("op {i}"),
            });
        }
        assert!(!mc.session().summaries.is_empty());
    }

    #[test]
    fn checkpoint_and_restore_round_trips_working_memory() {
        let (mut mc, _temp) = core(100_000);
        mc.record_operation(Operation {
            kind: OperationKind::Prompt,
            token_count: 10,
            timestamp: 1,
            body: "hello".into(),
        });

        let checkpoint = mc.checkpoint("session-1", CheckpointTrigger::Manual, "interaction-1").unwrap();
        let before_len = mc.working_memory().len();

        mc.record_operation(Operation {
            kind: OperationKind::Prompt,
            token_count: 10,
            timestamp: 2,
            body: "world".into(),
        });
        assert_ne!(mc.working_memory().len(), before_len);

        let last_interaction = mc.restore(&checkpoint.id).unwrap();
        assert_eq!(last_interaction, "interaction-1");
        assert_eq!(mc.working_memory().len(), before_len);
    }

    #[test]
    fn red_zone_blocks_outgoing_calls() {
        let (mut mc, _temp) = core(100);
        for i in 0..50 {
            mc.record_operation(Operation {
                kind: OperationKind::Prompt,
                token_count: 2,
                timestamp: i,
                body: "x".repeat(10),
            });
        }
        assert!(mc.guard_outgoing_call().is_err());
    }

    #[test]
    fn large_operation_bodies_are_externalized_on_build() {
        let (mut mc, _temp) = core(1_000_000);
        let oversized = mc.config.externalization_threshold + 1;
        mc.record_operation(Operation {
            kind: OperationKind::ToolCall,
            token_count: 5,
            timestamp: 1,
            body: "x".repeat(oversized),
        });
        let context = mc.build_context(&[]).unwrap();
        assert!(context.contains("externalized"));
    }
}
