use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "ACTIVE",
            ProjectStatus::Paused => "PAUSED",
            ProjectStatus::Completed => "COMPLETED",
            ProjectStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(ProjectStatus::Active),
            "PAUSED" => Some(ProjectStatus::Paused),
            "COMPLETED" => Some(ProjectStatus::Completed),
            "ARCHIVED" => Some(ProjectStatus::Archived),
            _ => None,
        }
    }
}

/// Owner of a working directory on the host file system. Never hard-deleted
/// while any live work item references it; soft-delete is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub working_directory: String,
    pub status: ProjectStatus,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
