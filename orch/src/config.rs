//! Configuration types and loading chain: `--config` path, then
//! `.orchestrator.yml` in the working directory, then
//! `$XDG_CONFIG_HOME/orch/orch.yml`, then built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::Context;
use serde::{Deserialize, Serialize};

use crate::error::OrchError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub model: ModelConfig,
    pub orchestration: OrchestrationConfig,
    pub context: ContextConfig,
    pub validation: ValidationConfig,
    pub nl: NlConfig,
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn load(config_path: Option<&PathBuf>) -> eyre::Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("failed to load config from {}", path.display()));
        }

        let local = PathBuf::from(".orchestrator.yml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!(path = %local.display(), error = %e, "Config::load: failed to parse local config"),
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("orch").join("orch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!(path = %user_config.display(), error = %e, "Config::load: failed to parse user config"),
                }
            }
        }

        tracing::info!("Config::load: no config file found, using defaults");
        Self::default().validated()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("failed to parse config file")?;
        config.validated().map_err(Into::into)
    }

    /// Checks every structural invariant of the configuration tree and returns a tagged
    /// [`OrchError::Config`] naming the offending key on the first failure.
    pub fn validated(self) -> eyre::Result<Self> {
        let mt = &self.orchestration.max_turns;
        if mt.min < 3 {
            return Err(config_err("orchestration.max_turns.min", ">= 3", mt.min.to_string()));
        }
        if mt.max > 30 {
            return Err(config_err("orchestration.max_turns.max", "<= 30", mt.max.to_string()));
        }
        if !(mt.min..=mt.max).contains(&mt.default) {
            return Err(config_err("orchestration.max_turns.default", "between min and max", mt.default.to_string()));
        }
        if mt.retry_multiplier < 1.0 {
            return Err(config_err("orchestration.max_turns.retry_multiplier", ">= 1.0", mt.retry_multiplier.to_string()));
        }

        let ct = &self.context.thresholds;
        if !(0.0 < ct.warning && ct.warning < ct.refresh && ct.refresh < ct.critical && ct.critical < 1.0) {
            return Err(config_err(
                "context.thresholds",
                "0 < warning < refresh < critical < 1",
                format!("{}, {}, {}", ct.warning, ct.refresh, ct.critical),
            ));
        }

        if self.agent.response_timeout < 60 {
            return Err(config_err("agent.response_timeout", ">= 60", self.agent.response_timeout.to_string()));
        }

        Ok(self)
    }
}

fn config_err(key: &'static str, expected: &'static str, actual: String) -> eyre::Report {
    OrchError::Config { key, expected, actual }.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(rename = "type")]
    pub agent_type: String,
    pub response_timeout: u64,
    pub retries: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { agent_type: "subprocess".to_string(), response_timeout: 7200, retries: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(rename = "type")]
    pub model_type: String,
    pub context_window: u32,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { model_type: "anthropic".to_string(), context_window: 200_000, temperature: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxTurnsConfig {
    pub min: u32,
    pub max: u32,
    pub default: u32,
    pub retry_multiplier: f64,
    pub max_retries: u32,
    pub auto_retry: bool,
}

impl Default for MaxTurnsConfig {
    fn default() -> Self {
        Self { min: 3, max: 30, default: 10, retry_multiplier: 2.0, max_retries: 3, auto_retry: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub max_iterations: u32,
    pub iteration_timeout: u64,
    pub max_turns: MaxTurnsConfig,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self { max_iterations: 25, iteration_timeout: 7200, max_turns: MaxTurnsConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextThresholds {
    pub warning: f64,
    pub refresh: f64,
    pub critical: f64,
}

impl Default for ContextThresholds {
    fn default() -> Self {
        Self { warning: 0.50, refresh: 0.70, critical: 0.85 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub thresholds: ContextThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub quality_floor: u8,
    pub quality_target: u8,
    pub confidence_floor: u8,
    pub confidence_target: u8,
    pub breakpoint_confidence_threshold: u8,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { quality_floor: 50, quality_target: 70, confidence_floor: 30, confidence_target: 50, breakpoint_confidence_threshold: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NlConfig {
    pub confidence_threshold: f32,
    pub confirmation_timeout: i64,
    pub bulk_require_confirmation: bool,
}

impl Default for NlConfig {
    fn default() -> Self {
        Self { confidence_threshold: 0.7, confirmation_timeout: 60, bulk_require_confirmation: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub redact_pii: bool,
    pub redact_secrets: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub max_file_size_mb: u64,
    pub max_files: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { max_file_size_mb: 50, max_files: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionLoggingConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub events: Vec<String>,
    pub privacy: PrivacyConfig,
    pub rotation: RotationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub production_logging: ProductionLoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file backing the state store. When unset, falls back
    /// to `<data-dir>/orch/state.db`.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("orch")
                .join("state.db")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validated().unwrap();
    }

    #[test]
    fn max_turns_min_below_three_is_rejected() {
        let mut config = Config::default();
        config.orchestration.max_turns.min = 1;
        assert!(config.validated().is_err());
    }

    #[test]
    fn max_turns_default_outside_bounds_is_rejected() {
        let mut config = Config::default();
        config.orchestration.max_turns.default = 50;
        assert!(config.validated().is_err());
    }

    #[test]
    fn context_thresholds_out_of_order_is_rejected() {
        let mut config = Config::default();
        config.context.thresholds.refresh = 0.40;
        assert!(config.validated().is_err());
    }

    #[test]
    fn short_response_timeout_is_rejected() {
        let mut config = Config::default();
        config.agent.response_timeout = 10;
        assert!(config.validated().is_err());
    }

    #[test]
    fn parses_yaml_with_partial_overrides() {
        let yaml = "validation:\n  quality_floor: 60\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.validation.quality_floor, 60);
        assert_eq!(config.validation.quality_target, 70);
    }

    #[test]
    fn explicit_storage_path_wins_over_default() {
        let storage = StorageConfig { path: Some(PathBuf::from("/var/lib/orch/db.sqlite")) };
        assert_eq!(storage.resolve_path(), PathBuf::from("/var/lib/orch/db.sqlite"));
        let fallback = StorageConfig::default().resolve_path();
        assert!(fallback.ends_with("orch/state.db"));
    }
}
