use serde::{Deserialize, Serialize};

/// Variant of the work-item hierarchy ("hierarchical unit with dependencies").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemKind {
    Epic,
    Story,
    Task,
    Subtask,
    Milestone,
}

impl WorkItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemKind::Epic => "EPIC",
            WorkItemKind::Story => "STORY",
            WorkItemKind::Task => "TASK",
            WorkItemKind::Subtask => "SUBTASK",
            WorkItemKind::Milestone => "MILESTONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EPIC" => Some(WorkItemKind::Epic),
            "STORY" => Some(WorkItemKind::Story),
            "TASK" => Some(WorkItemKind::Task),
            "SUBTASK" => Some(WorkItemKind::Subtask),
            "MILESTONE" => Some(WorkItemKind::Milestone),
            _ => None,
        }
    }

    /// Child-first cascade order used by bulk/cascading deletes: Subtasks →
    /// Tasks → Stories → Epics. Milestone has no children in this hierarchy.
    pub fn cascade_order() -> [WorkItemKind; 4] {
        [
            WorkItemKind::Subtask,
            WorkItemKind::Task,
            WorkItemKind::Story,
            WorkItemKind::Epic,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItemStatus {
    Pending,
    Running,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Pending => "PENDING",
            WorkItemStatus::Running => "RUNNING",
            WorkItemStatus::Blocked => "BLOCKED",
            WorkItemStatus::Completed => "COMPLETED",
            WorkItemStatus::Failed => "FAILED",
            WorkItemStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(WorkItemStatus::Pending),
            "RUNNING" => Some(WorkItemStatus::Running),
            "BLOCKED" => Some(WorkItemStatus::Blocked),
            "COMPLETED" => Some(WorkItemStatus::Completed),
            "FAILED" => Some(WorkItemStatus::Failed),
            "CANCELLED" => Some(WorkItemStatus::Cancelled),
            _ => None,
        }
    }
}

/// 1-10 scale; HIGH=1, MEDIUM=5, LOW=10 when spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    pub const HIGH: Priority = Priority(1);
    pub const MEDIUM: Priority = Priority(5);
    pub const LOW: Priority = Priority(10);

    pub fn clamped(value: u8) -> Self {
        Priority(value.clamp(1, 10))
    }

    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "HIGH" => Some(Priority::HIGH),
            "MEDIUM" => Some(Priority::MEDIUM),
            "LOW" => Some(Priority::LOW),
            _ => None,
        }
    }
}

/// Common shape shared by Epic/Story/Task/Subtask/Milestone. `parent_id`
/// names the optional owning item (Story may own a Task, Epic may own a
/// Story, Task owns a Subtask); Milestone instead uses `required_epics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub project_id: String,
    pub kind: WorkItemKind,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: WorkItemStatus,
    pub parent_id: Option<String>,
    pub dependencies: Vec<String>,
    /// Only meaningful for `WorkItemKind::Milestone`: the Epic ids required
    /// for the milestone to be considered reachable.
    pub required_epics: Vec<String>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_words_map_to_spec_values() {
        assert_eq!(Priority::from_word("high"), Some(Priority::HIGH));
        assert_eq!(Priority::from_word("Medium"), Some(Priority::MEDIUM));
        assert_eq!(Priority::from_word("LOW"), Some(Priority::LOW));
        assert_eq!(Priority::HIGH.0, 1);
        assert_eq!(Priority::MEDIUM.0, 5);
        assert_eq!(Priority::LOW.0, 10);
    }

    #[test]
    fn priority_clamps_to_valid_range() {
        assert_eq!(Priority::clamped(0).0, 1);
        assert_eq!(Priority::clamped(200).0, 10);
    }

    #[test]
    fn cascade_order_is_child_first() {
        let order = WorkItemKind::cascade_order();
        assert_eq!(order, [WorkItemKind::Subtask, WorkItemKind::Task, WorkItemKind::Story, WorkItemKind::Epic]);
    }
}
