//! Executes a classified [`OperationContext`] against a [`StateManager`].
//! This is the seam between NL classification and persistence — the
//! pipeline stages above never touch the store directly.

use std::collections::HashMap;

use statestore::{Priority, StateManager, WorkItem, WorkItemKind, WorkItemStatus, generate_id};

use crate::error::{OrchError, Result};
use crate::nl::entity::EntityType;
use crate::nl::identifier::Identifier;
use crate::nl::operation::Operation;
use crate::nl::pipeline::OperationContext;

/// What executing an [`OperationContext`] produced, in a form a REPL/CLI
/// caller can render without re-deriving it from raw store rows.
#[derive(Clone, Debug)]
pub enum ExecutionOutcome {
    Created { kind: WorkItemKind, id: String },
    Updated { kind: WorkItemKind, id: String },
    Deleted { kind: WorkItemKind, id: String },
    BulkDeleted { counts: Vec<(WorkItemKind, usize)> },
    Listed { items: Vec<WorkItem> },
}

pub async fn execute(store: &StateManager, ctx: &OperationContext) -> Result<ExecutionOutcome> {
    let no_entity = || OrchError::ValidationError {
        stage: "executor",
        field: "entity".to_string(),
        message: "no work-item entity to operate on".to_string(),
    };

    match ctx.operation {
        Operation::Create => execute_create(store, ctx, first_work_item_kind(&ctx.entities).ok_or_else(no_entity)?).await,
        Operation::Update => execute_update(store, ctx, first_work_item_kind(&ctx.entities).ok_or_else(no_entity)?).await,
        // Multi-entity delete phrasing ("delete all epics stories and tasks")
        // names every tier explicitly; the most ancestral tier present
        // already cascades to everything below it (statestore's
        // `delete_all_of`), so that single call covers the whole phrase.
        Operation::Delete => execute_delete(store, ctx, topmost_work_item_kind(&ctx.entities).ok_or_else(no_entity)?).await,
        Operation::Read | Operation::Query => execute_query(store, ctx, first_work_item_kind(&ctx.entities).ok_or_else(no_entity)?).await,
    }
}

fn first_work_item_kind(entities: &[EntityType]) -> Option<WorkItemKind> {
    entities.iter().find_map(|e| match e {
        EntityType::WorkItem(kind) => Some(*kind),
        EntityType::Project => None,
    })
}

/// The entity kind closest to the root of [`WorkItemKind::cascade_order`]
/// among those named — e.g. {Story, Task} resolves to Story, since deleting
/// all Stories already cascades to their Tasks and Subtasks.
fn topmost_work_item_kind(entities: &[EntityType]) -> Option<WorkItemKind> {
    let order = WorkItemKind::cascade_order();
    entities
        .iter()
        .filter_map(|e| match e {
            EntityType::WorkItem(kind) => Some(*kind),
            EntityType::Project => None,
        })
        .max_by_key(|kind| order.iter().position(|k| k == kind).unwrap_or(0))
}

async fn execute_create(store: &StateManager, ctx: &OperationContext, kind: WorkItemKind) -> Result<ExecutionOutcome> {
    let title = ctx.parameters.title.clone().unwrap_or_else(|| format!("untitled {kind:?}"));
    let item = WorkItem {
        id: generate_id(),
        project_id: ctx.project_id.clone(),
        kind,
        title,
        description: ctx.parameters.description.clone().unwrap_or_default(),
        priority: ctx.parameters.priority.unwrap_or(Priority::MEDIUM),
        status: WorkItemStatus::Pending,
        parent_id: ctx.parameters.epic_id.clone().or_else(|| ctx.parameters.story_id.clone()).or_else(|| ctx.parameters.parent_task_id.clone()),
        dependencies: ctx.parameters.dependencies.clone(),
        required_epics: Vec::new(),
        is_deleted: false,
        created_at: 0,
        updated_at: 0,
    };
    let created = store.create_work_item(item).await.map_err(OrchError::from)?;
    Ok(ExecutionOutcome::Created { kind, id: created.id })
}

async fn execute_update(store: &StateManager, ctx: &OperationContext, kind: WorkItemKind) -> Result<ExecutionOutcome> {
    let id = resolve_single_id(store, ctx, kind).await?;
    let mut updates: HashMap<String, serde_json::Value> = HashMap::new();
    if let Some(title) = &ctx.parameters.title {
        updates.insert("title".to_string(), serde_json::json!(title));
    }
    if let Some(description) = &ctx.parameters.description {
        updates.insert("description".to_string(), serde_json::json!(description));
    }
    if let Some(priority) = ctx.parameters.priority {
        updates.insert("priority".to_string(), serde_json::json!(priority.0));
    }
    if let Some(status) = ctx.parameters.status {
        updates.insert("status".to_string(), serde_json::json!(status));
    }
    store.update_work_item(&id, updates).await.map_err(OrchError::from)?;
    Ok(ExecutionOutcome::Updated { kind, id })
}

async fn execute_delete(store: &StateManager, ctx: &OperationContext, kind: WorkItemKind) -> Result<ExecutionOutcome> {
    if ctx.identifier == Some(Identifier::All) {
        let counts = store.delete_all_of(&ctx.project_id, kind).await.map_err(OrchError::from)?;
        let mut ordered: Vec<(WorkItemKind, usize)> = counts.into_iter().collect();
        ordered.sort_by_key(|(k, _)| WorkItemKind::cascade_order().iter().position(|c| c == k).unwrap_or(usize::MAX));
        return Ok(ExecutionOutcome::BulkDeleted { counts: ordered });
    }
    let id = resolve_single_id(store, ctx, kind).await?;
    store.delete_work_item(&id, true).await.map_err(OrchError::from)?;
    Ok(ExecutionOutcome::Deleted { kind, id })
}

async fn execute_query(store: &StateManager, ctx: &OperationContext, kind: WorkItemKind) -> Result<ExecutionOutcome> {
    let items = store.list_work_items(&ctx.project_id, kind, false).await.map_err(OrchError::from)?;
    Ok(ExecutionOutcome::Listed { items })
}

async fn resolve_single_id(store: &StateManager, ctx: &OperationContext, kind: WorkItemKind) -> Result<String> {
    let no_match = || OrchError::ValidationError {
        stage: "executor",
        field: "identifier".to_string(),
        message: "no matching work item found".to_string(),
    };

    let items = store.list_work_items(&ctx.project_id, kind, false).await.map_err(OrchError::from)?;
    match &ctx.identifier {
        Some(Identifier::Numeric(n)) => {
            let needle = n.to_string();
            items.into_iter().find(|i| i.id == needle).map(|i| i.id).ok_or_else(no_match)
        }
        Some(Identifier::Title(title)) => items.into_iter().find(|i| &i.title == title).map(|i| i.id).ok_or_else(no_match),
        None => {
            let title = ctx.parameters.title.clone().ok_or_else(no_match)?;
            items.into_iter().find(|i| i.title == title).map(|i| i.id).ok_or_else(no_match)
        }
        Some(Identifier::All) => Err(OrchError::ValidationError {
            stage: "executor",
            field: "identifier".to_string(),
            message: "__ALL__ is not a valid identifier for a single-item operation".to_string(),
        }),
    }
}
