//! Registries for agent and model implementations, keyed by the `type`
//! names the configuration uses. Populated at startup by the embedding
//! application; lookups of an unregistered name surface a configuration
//! error naming the offending key, since this crate ships no concrete
//! transport of its own.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{OrchError, Result};
use crate::ports::{AgentPort, ModelPort};

#[derive(Default)]
pub struct PortRegistry {
    agents: HashMap<String, Arc<dyn AgentPort>>,
    models: HashMap<String, Arc<dyn ModelPort>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<dyn AgentPort>) {
        self.agents.insert(name.into(), agent);
    }

    pub fn register_model(&mut self, name: impl Into<String>, model: Arc<dyn ModelPort>) {
        self.models.insert(name.into(), model);
    }

    pub fn agent(&self, name: &str) -> Result<Arc<dyn AgentPort>> {
        self.agents.get(name).cloned().ok_or(OrchError::Config {
            key: "agent.type",
            expected: "the name of a registered agent transport",
            actual: name.to_string(),
        })
    }

    pub fn model(&self, name: &str) -> Result<Arc<dyn ModelPort>> {
        self.models.get(name).cloned().ok_or(OrchError::Config {
            key: "model.type",
            expected: "the name of a registered validator model",
            actual: name.to_string(),
        })
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}
