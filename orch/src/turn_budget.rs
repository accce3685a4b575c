//! Adaptive per-task turn budget.

use tracing::debug;

const COMPLEXITY_WORDS: &[&str] = &[
    "migrate",
    "refactor",
    "implement",
    "debug",
    "comprehensive",
    "entire",
    "all",
    "complete",
    "full",
    "across",
    "multiple",
    "system",
    "architecture",
    "framework",
];

const SCOPE_PHRASES: &[&str] = &[
    "all files",
    "entire codebase",
    "multiple",
    "across",
    "throughout",
    "repository",
    "project-wide",
    "every",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskType {
    Validation,
    Planning,
    Documentation,
    ErrorAnalysis,
    Testing,
    CodeGeneration,
    Refactoring,
    Debugging,
}

impl TaskType {
    fn default_turns(self) -> u32 {
        match self {
            Self::Validation => 5,
            Self::Planning => 5,
            Self::Documentation => 3,
            Self::ErrorAnalysis => 8,
            Self::Testing => 8,
            Self::CodeGeneration => 12,
            Self::Refactoring => 15,
            Self::Debugging => 20,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TaskSignals<'a> {
    pub task_type: Option<TaskType>,
    pub text: &'a str,
    pub estimated_files: u32,
    pub estimated_loc: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct TurnBudgetBounds {
    pub min_turns: u32,
    pub max_turns: u32,
    pub default_turns: u32,
}

impl Default for TurnBudgetBounds {
    fn default() -> Self {
        Self {
            min_turns: 3,
            max_turns: 30,
            default_turns: 10,
        }
    }
}

/// The chosen budget plus the reasoning, logged alongside it for
/// auditability: the rationale is logged next to the chosen value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnBudget {
    pub turns: u32,
    pub rationale: String,
}

pub struct TurnBudgeter {
    bounds: TurnBudgetBounds,
}

impl TurnBudgeter {
    pub fn new(bounds: TurnBudgetBounds) -> Self {
        Self { bounds }
    }

    pub fn calculate(&self, signals: &TaskSignals<'_>) -> TurnBudget {
        if let Some(task_type) = signals.task_type {
            let turns = self.clamp(task_type.default_turns());
            let budget = TurnBudget {
                turns,
                rationale: format!("task_type={task_type:?} default={turns}"),
            };
            debug!(turns = budget.turns, rationale = %budget.rationale, "TurnBudgeter::calculate");
            return budget;
        }

        let lower = signals.text.to_lowercase();
        let complexity = COMPLEXITY_WORDS.iter().filter(|w| lower.contains(*w)).count();
        let scope = SCOPE_PHRASES.iter().filter(|w| lower.contains(*w)).count();

        let (raw, why) = if signals.estimated_loc > 500 || scope >= 2 {
            (20, "very complex: loc>500 or scope>=2")
        } else if complexity == 0 && scope == 0 && signals.estimated_files <= 1 {
            (3, "simple: no complexity/scope words, <=1 file")
        } else if complexity <= 1 && scope == 0 && signals.estimated_files <= 3 {
            (6, "medium: <=1 complexity word, <=3 files")
        } else if complexity <= 2 && scope == 1 && signals.estimated_files <= 8 {
            (12, "complex: <=2 complexity words, scope=1, <=8 files")
        } else {
            (self.bounds.default_turns, "no rule matched: configured default")
        };

        let turns = self.clamp(raw);
        let budget = TurnBudget {
            turns,
            rationale: format!("{why} (complexity={complexity}, scope={scope}, files={}, loc={})", signals.estimated_files, signals.estimated_loc),
        };
        debug!(turns = budget.turns, rationale = %budget.rationale, "TurnBudgeter::calculate");
        budget
    }

    /// Double the budget for a MAX_TURNS retry, clamped to the cap.
    pub fn retry_budget(&self, previous: u32, retry_multiplier: f64) -> u32 {
        let doubled = (previous as f64 * retry_multiplier).round() as u32;
        self.clamp(doubled)
    }

    fn clamp(&self, turns: u32) -> u32 {
        turns.clamp(self.bounds.min_turns, self.bounds.max_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn budgeter() -> TurnBudgeter {
        TurnBudgeter::new(TurnBudgetBounds::default())
    }

    #[test]
    fn task_type_default_clamped() {
        let b = budgeter();
        let budget = b.calculate(&TaskSignals {
            task_type: Some(TaskType::Debugging),
            text: "",
            estimated_files: 0,
            estimated_loc: 0,
        });
        assert_eq!(budget.turns, 20);
    }

    #[test]
    fn very_complex_by_loc() {
        let b = budgeter();
        let budget = b.calculate(&TaskSignals {
            task_type: None,
            text: "Refactor authentication across multiple modules",
            estimated_files: 5,
            estimated_loc: 650,
        });
        assert_eq!(budget.turns, 20);
    }

    #[test]
    fn simple_task() {
        let b = budgeter();
        let budget = b.calculate(&TaskSignals {
            task_type: None,
            text: "Fix typo in README",
            estimated_files: 1,
            estimated_loc: 2,
        });
        assert_eq!(budget.turns, 3);
    }

    #[test]
    fn clamps_to_bounds() {
        let b = TurnBudgeter::new(TurnBudgetBounds {
            min_turns: 3,
            max_turns: 30,
            default_turns: 10,
        });
        assert_eq!(b.clamp(1), 3);
        assert_eq!(b.clamp(999), 30);
    }

    #[test]
    fn retry_doubles_and_clamps() {
        let b = budgeter();
        assert_eq!(b.retry_budget(20, 2.0), 30);
        assert_eq!(b.retry_budget(3, 2.0), 6);
    }

    proptest! {
        #[test]
        fn calculate_always_within_bounds(loc in 0u32..2000, files in 0u32..20, complexity_hits in 0usize..5) {
            let bounds = TurnBudgetBounds::default();
            let b = TurnBudgeter::new(bounds);
            let text = COMPLEXITY_WORDS[..complexity_hits.min(COMPLEXITY_WORDS.len())].join(" ");
            let budget = b.calculate(&TaskSignals {
                task_type: None,
                text: &text,
                estimated_files: files,
                estimated_loc: loc,
            });
            prop_assert!(budget.turns >= bounds.min_turns && budget.turns <= bounds.max_turns);
        }
    }
}
