use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakpointReason {
    LowConfidence,
    QualityBelowFloor,
    ValidationFailed,
    DestructiveOp,
    ExplicitRequest,
    BudgetExhausted,
    Escalate,
}

impl BreakpointReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakpointReason::LowConfidence => "LOW_CONFIDENCE",
            BreakpointReason::QualityBelowFloor => "QUALITY_BELOW_FLOOR",
            BreakpointReason::ValidationFailed => "VALIDATION_FAILED",
            BreakpointReason::DestructiveOp => "DESTRUCTIVE_OP",
            BreakpointReason::ExplicitRequest => "EXPLICIT_REQUEST",
            BreakpointReason::BudgetExhausted => "BUDGET_EXHAUSTED",
            BreakpointReason::Escalate => "ESCALATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW_CONFIDENCE" => Some(BreakpointReason::LowConfidence),
            "QUALITY_BELOW_FLOOR" => Some(BreakpointReason::QualityBelowFloor),
            "VALIDATION_FAILED" => Some(BreakpointReason::ValidationFailed),
            "DESTRUCTIVE_OP" => Some(BreakpointReason::DestructiveOp),
            "EXPLICIT_REQUEST" => Some(BreakpointReason::ExplicitRequest),
            "BUDGET_EXHAUSTED" => Some(BreakpointReason::BudgetExhausted),
            "ESCALATE" => Some(BreakpointReason::Escalate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakpointResolution {
    Proceed,
    Retry,
    Clarify,
    Escalate,
    Abort,
}

impl BreakpointResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakpointResolution::Proceed => "PROCEED",
            BreakpointResolution::Retry => "RETRY",
            BreakpointResolution::Clarify => "CLARIFY",
            BreakpointResolution::Escalate => "ESCALATE",
            BreakpointResolution::Abort => "ABORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PROCEED" => Some(BreakpointResolution::Proceed),
            "RETRY" => Some(BreakpointResolution::Retry),
            "CLARIFY" => Some(BreakpointResolution::Clarify),
            "ESCALATE" => Some(BreakpointResolution::Escalate),
            "ABORT" => Some(BreakpointResolution::Abort),
            _ => None,
        }
    }
}

/// A persisted pause point. A task with an unresolved breakpoint may not
/// advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: String,
    pub task_id: String,
    pub reason: BreakpointReason,
    pub triggered_at: i64,
    pub resolved_at: Option<i64>,
    pub resolution: Option<BreakpointResolution>,
}

impl Breakpoint {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}
