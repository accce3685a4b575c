//! Working and session memory tiers.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Kind of an operation recorded in working memory. Drives pruning order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Prompt,
    Response,
    ToolCall,
    Validation,
    Debug,
    Trace,
}

impl OperationKind {
    /// Debug/trace operations are the first pruning target.
    pub fn is_prunable_by_age(self) -> bool {
        matches!(self, OperationKind::Debug | OperationKind::Trace)
    }
}

/// A single opaque unit of working memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub token_count: u32,
    pub timestamp: i64,
    pub body: String,
}

/// Bounded, FIFO-evicting sequence of recent operations.
///
/// Bounded by `max_operations` and `max_tokens_pct` of the configured
/// context size; eviction moves the oldest operation out, for the caller
/// to archive into the session tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingMemory {
    operations: VecDeque<Operation>,
    max_operations: usize,
    max_tokens: u32,
}

impl WorkingMemory {
    pub fn new(max_operations: usize, max_tokens: u32) -> Self {
        Self {
            operations: VecDeque::new(),
            max_operations,
            max_tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn total_tokens(&self) -> u32 {
        self.operations.iter().map(|op| op.token_count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Push a new operation, evicting from the front as needed to stay within
    /// bounds. Returns every operation evicted as a result, oldest first.
    pub fn push(&mut self, op: Operation) -> Vec<Operation> {
        self.operations.push_back(op);
        let mut evicted = Vec::new();

        while self.operations.len() > self.max_operations
            || (self.max_tokens > 0 && self.total_tokens() > self.max_tokens)
        {
            match self.operations.pop_front() {
                Some(op) => evicted.push(op),
                None => break,
            }
        }

        evicted
    }

    /// Drop debug/trace operations older than `pruning_age` operations-ago.
    /// Returns the number pruned.
    pub fn prune_by_age(&mut self, pruning_age: usize) -> usize {
        let len = self.operations.len();
        if len <= pruning_age {
            return 0;
        }
        let cutoff = len - pruning_age;
        let mut pruned = 0;
        let mut kept = VecDeque::with_capacity(len);
        for (idx, op) in self.operations.drain(..).enumerate() {
            if idx < cutoff && op.kind.is_prunable_by_age() {
                pruned += 1;
            } else {
                kept.push_back(op);
            }
        }
        self.operations = kept;
        pruned
    }

    /// Keep only the last `keep` validation records, dropping earlier ones.
    pub fn prune_validation_results(&mut self, keep: usize) -> usize {
        let total_validation = self
            .operations
            .iter()
            .filter(|op| op.kind == OperationKind::Validation)
            .count();
        if total_validation <= keep {
            return 0;
        }
        let mut to_drop = total_validation - keep;
        let mut pruned = 0;
        let mut kept = VecDeque::with_capacity(self.operations.len());
        for op in self.operations.drain(..) {
            if op.kind == OperationKind::Validation && to_drop > 0 {
                to_drop -= 1;
                pruned += 1;
            } else {
                kept.push_back(op);
            }
        }
        self.operations = kept;
        pruned
    }
}

/// Registry entry for a previously described file artifact: its last known
/// hash and a short summary, used in place of the full body (Artifact
/// Registry optimization technique).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub hash: String,
    pub summary: String,
}

/// Compact per-session document: tokens used so far, accumulated summaries,
/// and the artifact registry. Persisted per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMemory {
    pub tokens_used: u32,
    pub summaries: Vec<String>,
    pub artifact_registry: HashMap<String, ArtifactEntry>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tokens(&mut self, tokens: u32) {
        self.tokens_used += tokens;
    }

    pub fn push_summary(&mut self, summary: String) {
        self.summaries.push(summary);
    }

    pub fn register_artifact(&mut self, path: impl Into<String>, hash: impl Into<String>, summary: impl Into<String>) {
        self.artifact_registry.insert(
            path.into(),
            ArtifactEntry {
                hash: hash.into(),
                summary: summary.into(),
            },
        );
    }
}
