//! Error types for memorycore

use thiserror::Error;

/// Errors surfaced by the memory core.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("io error during {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("episode not found: {0}")]
    EpisodeNotFound(String),

    #[error("context usage is critical ({used_pct:.1}% of window); refuse new calls until refreshed")]
    ContextCritical { used_pct: f64 },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
