//! End-to-end scenarios from the testable-properties list: natural-language
//! commands against a real `StateManager`, turn-budget retry/clamp
//! behavior, and the REPL's slash/natural-language routing split.

use orch::nl::{Identifier, NlOutcome, NlPipeline, NlPipelineConfig, Operation, execute};
use orch::repl::{ReplInput, parse_line};
use orch::turn_budget::{TaskSignals, TurnBudgeter, TurnBudgetBounds};
use statestore::{StateManager, WorkItemKind, WorkItemStatus};
use tempfile::TempDir;

async fn store() -> (TempDir, StateManager, statestore::Project) {
    let dir = TempDir::new().expect("tempdir");
    let (store, _report) = StateManager::spawn(dir.path().join("state.db")).await.expect("spawn store");
    let project = store.create_project("TestProj", "/tmp/testproj").await.expect("create project");
    (dir, store, project)
}

fn pipeline() -> NlPipeline {
    NlPipeline::new(NlPipelineConfig::default())
}

/// Simple CREATE, happy path.
#[tokio::test]
async fn create_project_happy_path() {
    let (_dir, store, _seed_project) = store().await;
    let mut nl = pipeline();

    let outcome = nl.process("create a task title: \"Write the design doc\"", "p-seed", 0);
    assert!(outcome.confidence >= 0.7, "confidence {} should clear the auto-execution threshold", outcome.confidence);

    let ctx = outcome.operation_context.expect("a CREATE should not need confirmation");
    assert_eq!(ctx.operation, Operation::Create);

    let project = store.create_project("Real Project", "/tmp/real").await.unwrap();
    let mut ctx = ctx;
    ctx.project_id = project.id.clone();

    let result = execute(&store, &ctx).await.expect("execute create");
    match result {
        orch::nl::ExecutionOutcome::Created { kind, id } => {
            assert_eq!(kind, WorkItemKind::Task);
            let item = store.get_work_item(&id).await.unwrap();
            assert_eq!(item.title, "Write the design doc");
            assert_eq!(item.project_id, project.id);
            assert_eq!(item.status, WorkItemStatus::Pending);
        }
        other => panic!("expected Created, got {other:?}"),
    }
}

/// Bulk DELETE with cascading, seeded with one Epic / Story / Task.
#[tokio::test]
async fn bulk_delete_cascades_child_tiers_first() {
    let (_dir, store, project) = store().await;

    let epic = store
        .create_work_item(statestore::WorkItem {
            id: statestore::generate_id(),
            project_id: project.id.clone(),
            kind: WorkItemKind::Epic,
            title: "Epic".to_string(),
            description: String::new(),
            priority: statestore::Priority::MEDIUM,
            status: WorkItemStatus::Pending,
            parent_id: None,
            dependencies: vec![],
            required_epics: vec![],
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        })
        .await
        .unwrap();
    let story = store
        .create_work_item(statestore::WorkItem {
            id: statestore::generate_id(),
            project_id: project.id.clone(),
            kind: WorkItemKind::Story,
            title: "Story".to_string(),
            description: String::new(),
            priority: statestore::Priority::MEDIUM,
            status: WorkItemStatus::Pending,
            parent_id: Some(epic.id.clone()),
            dependencies: vec![],
            required_epics: vec![],
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        })
        .await
        .unwrap();
    store
        .create_work_item(statestore::WorkItem {
            id: statestore::generate_id(),
            project_id: project.id.clone(),
            kind: WorkItemKind::Task,
            title: "Task".to_string(),
            description: String::new(),
            priority: statestore::Priority::MEDIUM,
            status: WorkItemStatus::Pending,
            parent_id: Some(story.id.clone()),
            dependencies: vec![],
            required_epics: vec![],
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        })
        .await
        .unwrap();

    let mut nl = pipeline();
    let first = nl.process("delete all epics stories and tasks", &project.id, 0);
    assert!(first.pending.is_some(), "a destructive bulk op must ask for confirmation");
    assert_eq!(first.operation_context, None);

    let confirmed = nl.process("yes", &project.id, 1);
    let ctx = confirmed.operation_context.expect("confirmation should hand back the pending op");
    assert_eq!(ctx.identifier, Some(Identifier::All));

    let result = execute(&store, &ctx).await.expect("execute bulk delete");
    match result {
        orch::nl::ExecutionOutcome::BulkDeleted { counts } => {
            let pos = |k: WorkItemKind| counts.iter().position(|(kind, _)| *kind == k).unwrap();
            assert!(pos(WorkItemKind::Task) < pos(WorkItemKind::Story), "tasks deleted before stories");
            assert!(pos(WorkItemKind::Story) < pos(WorkItemKind::Epic), "stories deleted before epics");
        }
        other => panic!("expected BulkDeleted, got {other:?}"),
    }

    let remaining = store.list_work_items(&project.id, WorkItemKind::Epic, false).await.unwrap();
    assert!(remaining.is_empty());
    let including_deleted = store.list_work_items(&project.id, WorkItemKind::Epic, true).await.unwrap();
    assert_eq!(including_deleted.len(), 1, "soft delete keeps the row, just marks it deleted");
}

/// Budget exhaustion with retry — TurnBudgeter alone, since wiring a
/// scripted AgentPort through the full orchestrator is covered by
/// `orchestrator::tests`.
#[test]
fn turn_budget_retry_doubles_then_clamps_to_bounds() {
    let budgeter = TurnBudgeter::new(TurnBudgetBounds::default());
    let signals = TaskSignals {
        task_type: None,
        text: "Refactor authentication across multiple modules",
        estimated_files: 5,
        estimated_loc: 650,
    };
    let initial = budgeter.calculate(&signals);
    assert_eq!(initial.turns, 20);

    let retried = budgeter.retry_budget(initial.turns, 2.0);
    assert_eq!(retried, 30, "40 clamped down to the max of 30");
}

/// Clarification branch — low confidence, no store writes, nothing
/// pending, and the reply names the lowest-confidence stage.
#[test]
fn low_confidence_input_asks_for_clarification_without_touching_state() {
    let mut nl = pipeline();
    let outcome: NlOutcome = nl.process("help me", "p-1", 0);
    assert!(outcome.confidence < 0.7);
    assert!(outcome.operation_context.is_none());
    assert!(outcome.pending.is_none());
    assert!(outcome.response_text.contains("lowest-confidence stage"));
    assert_eq!(outcome.error_kind.as_deref(), Some("entity"));
}

/// An invalid slash command never reaches the NL pipeline.
#[test]
fn unknown_slash_command_is_rejected_before_nl_routing() {
    match parse_line("/unknown") {
        ReplInput::UnknownSlash { available, .. } => {
            assert!(!available.is_empty());
        }
        other => panic!("expected UnknownSlash, got {other:?}"),
    }
}

/// A confirmation arriving after expiry does not execute.
#[test]
fn expired_confirmation_does_not_execute() {
    let mut nl = pipeline();
    let first = nl.process("delete task \"Old task\"", "p-1", 0);
    assert!(first.pending.is_some());

    // 61s later, past the default 60s confirmation_timeout.
    let after_expiry = nl.process("yes", "p-1", 61);
    assert!(after_expiry.operation_context.is_none(), "an expired confirmation must not execute");
}
