//! The implementer-agent contract. The agent is an external process;
//! the core only ever sees this trait.

use async_trait::async_trait;

use crate::error::ExitReason;

/// Per-call context handed to the agent. The session id is owned and
/// mutated exclusively by [`crate::session_manager::SessionManager`] — the
/// port itself is a stateless sender that reads whatever id it is given.
#[derive(Clone, Debug)]
pub struct AgentCallContext {
    pub session_id: String,
    pub max_turns: u32,
    pub working_directory: std::path::PathBuf,
}

/// Structured response from a single agent call.
#[derive(Clone, Debug)]
pub struct AgentResult {
    pub text: String,
    pub input_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub output_tokens: u64,
    pub turns_used: u32,
    pub duration_ms: u64,
    pub exit_reason: ExitReason,
}

impl AgentResult {
    /// Tokens that count toward the session's window (cache reads excluded
    /// from the windowed total).
    pub fn windowed_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.output_tokens
    }
}

/// Capability interface for the implementer agent. The agent must not
/// retain state outside its own session id; restarts are allowed between
/// calls.
#[async_trait]
pub trait AgentPort: Send + Sync {
    async fn send(&self, prompt: &str, ctx: &AgentCallContext) -> AgentResult;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Returns queued results in order; panics if exhausted (test helper,
    /// not production code).
    pub struct ScriptedAgent {
        results: Mutex<Vec<AgentResult>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        pub fn new(results: Vec<AgentResult>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn prompt(&self, index: usize) -> String {
            self.calls.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl AgentPort for ScriptedAgent {
        async fn send(&self, prompt: &str, _ctx: &AgentCallContext) -> AgentResult {
            self.calls.lock().unwrap().push(prompt.to_string());
            self.results
                .lock()
                .unwrap()
                .pop()
                .expect("ScriptedAgent: no more scripted results")
        }
    }
}
