//! Episodic memory: append-only, versioned documents retained across sessions,
//! plus externalized (spilled) items too large for working memory.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MemoryError, Result};

/// One version of an episodic document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeVersion {
    pub version: u32,
    pub content: String,
    pub created_at: i64,
}

/// Append-only store of versioned documents, one subdirectory per document id.
pub struct EpisodicStore {
    base_path: PathBuf,
}

impl EpisodicStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|source| MemoryError::Io {
            op: "create episodic store directory",
            source,
        })?;
        debug!(?base_path, "opened episodic store");
        Ok(Self { base_path })
    }

    fn doc_path(&self, doc_id: &str) -> PathBuf {
        self.base_path.join(doc_id).join("versions.jsonl")
    }

    /// Append a new version of `doc_id`, returning the version number assigned.
    pub fn append(&self, doc_id: &str, content: impl Into<String>) -> Result<u32> {
        let doc_dir = self.base_path.join(doc_id);
        fs::create_dir_all(&doc_dir).map_err(|source| MemoryError::Io {
            op: "create episode directory",
            source,
        })?;

        let path = self.doc_path(doc_id);
        let next_version = self.list_versions(doc_id)?.last().map(|v| v + 1).unwrap_or(1);

        let entry = EpisodeVersion {
            version: next_version,
            content: content.into(),
            created_at: now_ms(),
        };

        let line = serde_json::to_string(&entry)?;
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| MemoryError::Io {
                op: "append episode version",
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| MemoryError::Io {
            op: "append episode version",
            source,
        })?;

        info!(doc_id, version = next_version, "appended episodic version");
        Ok(next_version)
    }

    /// Fetch a specific version, or the latest if `version` is `None`.
    pub fn get(&self, doc_id: &str, version: Option<u32>) -> Result<EpisodeVersion> {
        let versions = self.read_all(doc_id)?;
        match version {
            Some(v) => versions
                .into_iter()
                .find(|e| e.version == v)
                .ok_or_else(|| MemoryError::EpisodeNotFound(format!("{doc_id}@{v}"))),
            None => versions
                .into_iter()
                .last()
                .ok_or_else(|| MemoryError::EpisodeNotFound(doc_id.to_string())),
        }
    }

    pub fn list_versions(&self, doc_id: &str) -> Result<Vec<u32>> {
        Ok(self.read_all(doc_id)?.into_iter().map(|e| e.version).collect())
    }

    fn read_all(&self, doc_id: &str) -> Result<Vec<EpisodeVersion>> {
        let path = self.doc_path(doc_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|source| MemoryError::Io {
            op: "read episode versions",
            source,
        })?;
        let reader = BufReader::new(file);
        let mut versions = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|source| MemoryError::Io {
                op: "read episode versions",
                source,
            })?;
            versions.push(serde_json::from_str(&line)?);
        }
        Ok(versions)
    }

    /// Spill an oversized operation body to episodic storage under the
    /// `externalized` namespace, returning a pointer (`doc_id@version`) the
    /// working-memory entry can reference instead of the full body.
    pub fn externalize(&self, key: &str, content: impl Into<String>) -> Result<String> {
        let doc_id = format!("externalized/{key}");
        let version = self.append(&doc_id, content)?;
        Ok(format!("{doc_id}@{version}"))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_and_get_latest() {
        let temp = TempDir::new().unwrap();
        let store = EpisodicStore::open(temp.path()).unwrap();

        store.append("milestone-1", "first summary").unwrap();
        let v2 = store.append("milestone-1", "second summary").unwrap();
        assert_eq!(v2, 2);

        let latest = store.get("milestone-1", None).unwrap();
        assert_eq!(latest.content, "second summary");

        let first = store.get("milestone-1", Some(1)).unwrap();
        assert_eq!(first.content, "first summary");
    }

    #[test]
    fn missing_episode_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = EpisodicStore::open(temp.path()).unwrap();
        assert!(store.get("nope", None).is_err());
    }

    #[test]
    fn externalize_returns_resolvable_pointer() {
        let temp = TempDir::new().unwrap();
        let store = EpisodicStore::open(temp.path()).unwrap();
        let pointer = store.externalize("op-42", "a very large body").unwrap();
        assert_eq!(pointer, "externalized/op-42@1");
        let (doc_id, version) = pointer.split_once('@').unwrap();
        let fetched = store.get(doc_id, Some(version.parse().unwrap())).unwrap();
        assert_eq!(fetched.content, "a very large body");
    }
}
