use serde::{Deserialize, Serialize};

/// Append-only per-session record of tokens consumed. Cache-read tokens do
/// not count toward context-window usage; `total_tokens` excludes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedgerEntry {
    pub id: String,
    pub session_id: String,
    pub task_id: String,
    pub timestamp: i64,
    pub input_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

impl TokenLedgerEntry {
    /// `total_tokens` is input + cache_creation + output; cache-read tokens
    /// are recorded for billing but excluded from the window-usage total.
    pub fn windowed_total(input: i64, cache_creation: i64, output: i64) -> i64 {
        input + cache_creation + output
    }
}
