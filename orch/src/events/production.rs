//! Production log: one JSON object per line, with `type`, `ts`
//! (ISO-8601 UTC), `session` (UUID), and type-specific fields. A privacy
//! filter redacts emails, IPv4 addresses, and common API-key shapes before
//! any byte reaches disk, and files rotate at a configured size. Raw
//! model-internal reasoning is never written — callers log decisions and
//! results only.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::config::{PrivacyConfig, ProductionLoggingConfig, RotationConfig};

/// The `type` field vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductionRecordType {
    UserInput,
    NlResult,
    ExecutionResult,
    Error,
    OrchPrompt,
    ImplResponse,
}

impl ProductionRecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserInput => "user_input",
            Self::NlResult => "nl_result",
            Self::ExecutionResult => "execution_result",
            Self::Error => "error",
            Self::OrchPrompt => "orch_prompt",
            Self::ImplResponse => "impl_response",
        }
    }
}

pub struct ProductionLog {
    path: PathBuf,
    session: String,
    privacy: PrivacyConfig,
    rotation: RotationConfig,
    file: File,
}

impl ProductionLog {
    /// Returns `None` when production logging is disabled in config.
    pub fn open(config: &ProductionLoggingConfig) -> std::io::Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let path = config.path.clone().unwrap_or_else(|| PathBuf::from("orch-production.jsonl"));
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Some(Self {
            path,
            session: Uuid::now_v7().to_string(),
            privacy: config.privacy.clone(),
            rotation: config.rotation.clone(),
            file,
        }))
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Append one record. `fields` carries the type-specific payload; the
    /// `type`/`ts`/`session` envelope is added here.
    pub fn log(&mut self, record_type: ProductionRecordType, fields: Map<String, Value>) -> std::io::Result<()> {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(record_type.as_str().to_string()));
        object.insert("ts".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
        object.insert("session".to_string(), Value::String(self.session.clone()));
        object.extend(fields);

        let line = redact(&Value::Object(object).to_string(), &self.privacy);
        self.rotate_if_needed(line.len() as u64)?;
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }

    fn rotate_if_needed(&mut self, incoming_bytes: u64) -> std::io::Result<()> {
        let max_bytes = self.rotation.max_file_size_mb * 1024 * 1024;
        let current = self.file.metadata().map(|m| m.len()).unwrap_or(0);
        if current + incoming_bytes <= max_bytes || current == 0 {
            return Ok(());
        }

        for i in (1..self.rotation.max_files.max(1)).rev() {
            let from = rotated_path(&self.path, i);
            let to = rotated_path(&self.path, i + 1);
            if from.exists() {
                if i + 1 >= self.rotation.max_files.max(1) {
                    let _ = fs::remove_file(&from);
                } else {
                    fs::rename(&from, &to)?;
                }
            }
        }
        fs::rename(&self.path, rotated_path(&self.path, 1))?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        warn!(path = %self.path.display(), "production log rotated");
        Ok(())
    }
}

fn rotated_path(path: &PathBuf, index: u32) -> PathBuf {
    let mut os = path.clone().into_os_string();
    os.push(format!(".{index}"));
    PathBuf::from(os)
}

/// Regex redaction for emails, IPv4 addresses, and common API-key shapes.
/// PII and secret passes toggle independently.
pub fn redact(text: &str, privacy: &PrivacyConfig) -> String {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    static IPV4: OnceLock<Regex> = OnceLock::new();
    static API_KEY: OnceLock<Regex> = OnceLock::new();

    let mut out = text.to_string();

    if privacy.redact_pii {
        let email = EMAIL.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("static pattern compiles"));
        out = email.replace_all(&out, "[email-redacted]").into_owned();
        let ipv4 = IPV4.get_or_init(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("static pattern compiles"));
        out = ipv4.replace_all(&out, "[ip-redacted]").into_owned();
    }

    if privacy.redact_secrets {
        let api_key = API_KEY
            .get_or_init(|| Regex::new(r"\b(sk-[A-Za-z0-9_-]{8,}|AKIA[0-9A-Z]{16}|ghp_[A-Za-z0-9]{20,})\b").expect("static pattern compiles"));
        out = api_key.replace_all(&out, "[key-redacted]").into_owned();
    }

    out
}
