//! Configuration for memorycore

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MemoryError, Result};

/// Static configuration for a [`crate::MemoryCore`] instance.
///
/// `context_window` is the declared context window of the model the memory
/// core is protecting (the validator, or a small-context orchestrator); it is
/// the sole input to [`crate::optimizer::Profile::for_window`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory backing the episodic tier and checkpoint artifacts.
    pub store_path: PathBuf,

    /// Declared (or auto-detected) context window size, in tokens.
    pub context_window: u32,

    /// Size threshold (characters) above which an operation is externalized
    /// to the episodic tier instead of kept in working memory.
    pub externalization_threshold: usize,

    /// Age (in operations-ago) beyond which debug/trace operations are pruned.
    pub pruning_age: usize,
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orch")
        .join("memorycore")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            context_window: 100_000,
            externalization_threshold: 4_000,
            pruning_age: 50,
        }
    }
}

impl Config {
    /// Load config from file, or fall back to defaults.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_from_file(config_path);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("orch").join("memorycore.yml")),
            Some(PathBuf::from("memorycore.yml")),
        ];

        for path in default_paths.into_iter().flatten() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| MemoryError::Io {
            op: "read config",
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|e| MemoryError::Config(e.to_string()))
    }

    /// Persist this config to `path` as YAML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| MemoryError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|source| MemoryError::Io { op: "write config", source })
    }
}
