//! The validator-model contract. Synchronous and may be slow
//! (seconds); callers budget for that.

use async_trait::async_trait;

#[async_trait]
pub trait ModelPort: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> String;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    pub struct ScriptedModel {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(str::to_string).collect()),
            }
        }
    }

    #[async_trait]
    impl ModelPort for ScriptedModel {
        async fn generate(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> String {
            self.responses.lock().unwrap().pop().unwrap_or_default()
        }
    }
}
