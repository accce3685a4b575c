use serde::{Deserialize, Serialize};

/// Structured metadata recorded alongside each Interaction: the inputs and
/// outputs of every validation stage that ran against it —
/// all stages record their inputs and outputs on the Interaction row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionMetadata {
    pub turns_used: Option<i64>,
    pub duration_ms: Option<i64>,
    pub quality_score: Option<f64>,
    pub confidence: Option<f64>,
    pub decision: Option<String>,
    /// Turn-budget retries consumed before this interaction's agent call
    /// succeeded (MAX_TURNS doubling).
    pub retries: Option<i64>,
}

/// Append-only record of one agent call and its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub project_id: String,
    pub task_id: String,
    pub session_id: String,
    pub iteration: i64,
    pub prompt: String,
    pub response: String,
    pub timestamp: i64,
    pub metadata: InteractionMetadata,
}
