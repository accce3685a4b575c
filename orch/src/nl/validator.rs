//! Stage 6: validator. Enforces per-operation required fields
//! and the graph constraints cheap enough to check before a StatePort round
//! trip; the authoritative cycle check still happens in `statestore::Store`
//! when the mutation is actually applied.

use crate::error::OrchError;
use crate::nl::entity::EntityType;
use crate::nl::identifier::Identifier;
use crate::nl::operation::Operation;
use crate::nl::parameters::Parameters;

/// Non-fatal observations surfaced alongside a passing validation (e.g. a
/// Story created with no `epic_id`). Never blocks execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationWarning(pub String);

pub fn validate_operation(
    operation: Operation,
    entities: &[EntityType],
    identifier: &Option<Identifier>,
    params: &Parameters,
) -> crate::error::Result<Vec<ValidationWarning>> {
    let mut warnings = Vec::new();

    if entities.is_empty() {
        return Err(OrchError::ValidationError {
            stage: "validator",
            field: "entity".to_string(),
            message: "no recognized entity type".to_string(),
        });
    }

    let bulk_allowed = matches!(operation, Operation::Delete | Operation::Update | Operation::Query);
    if matches!(identifier, Some(Identifier::All)) && !bulk_allowed {
        return Err(OrchError::ValidationError {
            stage: "validator",
            field: "identifier".to_string(),
            message: "__ALL__ is only valid for DELETE, UPDATE, or QUERY".to_string(),
        });
    }

    if matches!(operation, Operation::Update | Operation::Delete) && identifier.is_none() {
        return Err(OrchError::ValidationError {
            stage: "validator",
            field: "identifier".to_string(),
            message: "an identifier is required for this operation".to_string(),
        });
    }

    if operation == Operation::Create {
        if entities.contains(&EntityType::WorkItem(statestore::WorkItemKind::Story)) && params.epic_id.is_none() {
            warnings.push(ValidationWarning("story created with no epic_id".to_string()));
        }
        if entities.contains(&EntityType::WorkItem(statestore::WorkItemKind::Subtask)) && params.parent_task_id.is_none() {
            warnings.push(ValidationWarning("subtask created with no parent_task_id".to_string()));
        }
        if entities.contains(&EntityType::WorkItem(statestore::WorkItemKind::Milestone)) && params.title.is_none() {
            return Err(OrchError::ValidationError {
                stage: "validator",
                field: "title".to_string(),
                message: "milestone creation requires a title".to_string(),
            });
        }
    }

    if let (Some(Identifier::Title(self_title)), false) = (identifier, params.dependencies.is_empty()) {
        if params.dependencies.iter().any(|d| d == self_title) {
            return Err(OrchError::ValidationError {
                stage: "validator",
                field: "dependencies".to_string(),
                message: "an item cannot depend on itself".to_string(),
            });
        }
    }

    Ok(warnings)
}
