//! `StateManager`: the actor wrapper enforcing single-writer, multi-reader
//! access to a [`Store`]. It is the only writer to persistent storage, and
//! it serializes writes internally.
//!
//! A single task owns the `Store` and drains a command channel; every public
//! method on `StateManager` sends a command and awaits a `oneshot` reply, so
//! concurrent callers never see a torn write.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::*;
use crate::error::{Result, StoreError};
use crate::recovery::{sweep_for_orphaned_sessions, RecoveryReport};
use crate::store::Store;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    CreateProject { name: String, working_directory: String, reply: Reply<Project> },
    GetProject { id: String, reply: Reply<Project> },
    ListProjects { include_deleted: bool, reply: Reply<Vec<Project>> },
    UpdateProject { id: String, updates: HashMap<String, Value>, reply: Reply<Project> },
    SoftDeleteProject { id: String, reply: Reply<()> },

    CreateWorkItem { item: WorkItem, reply: Reply<WorkItem> },
    GetWorkItem { id: String, reply: Reply<WorkItem> },
    ListWorkItems { project_id: String, kind: WorkItemKind, include_deleted: bool, reply: Reply<Vec<WorkItem>> },
    UpdateWorkItem { id: String, updates: HashMap<String, Value>, reply: Reply<WorkItem> },
    DeleteWorkItem { id: String, soft: bool, reply: Reply<()> },
    DeleteAllOf { project_id: String, kind: WorkItemKind, reply: Reply<HashMap<WorkItemKind, usize>> },

    CreateSessionRecord { project_id: String, milestone_id: Option<String>, reply: Reply<Session> },
    GetSession { id: String, reply: Reply<Session> },
    ListSessionsForMilestone { milestone_id: String, reply: Reply<Vec<Session>> },
    CompleteSessionRecord { id: String, reply: Reply<()> },
    SaveSessionSummary { id: String, summary: String, reply: Reply<()> },
    RefreshSession { current_session_id: String, summary: String, reply: Reply<Session> },
    TouchSessionHeartbeat { id: String, reply: Reply<()> },

    RecordTokenUsage {
        session_id: String,
        task_id: String,
        input_tokens: i64,
        cache_creation_tokens: i64,
        cache_read_tokens: i64,
        output_tokens: i64,
        reply: Reply<TokenLedgerEntry>,
    },
    GetSessionTokenUsage { session_id: String, reply: Reply<i64> },

    AppendInteraction { interaction: Interaction, reply: Reply<Interaction> },
    ListInteractionsForTask { task_id: String, reply: Reply<Vec<Interaction>> },

    CreateBreakpoint { task_id: String, reason: BreakpointReason, reply: Reply<Breakpoint> },
    ResolveBreakpoint { id: String, resolution: BreakpointResolution, reply: Reply<()> },
    UnresolvedBreakpointForTask { task_id: String, reply: Reply<Option<Breakpoint>> },

    RegisterCheckpoint { session_id: String, trigger: CheckpointTrigger, artifact_ref: String, reply: Reply<CheckpointRecord> },
    ListCheckpointsForSession { session_id: String, reply: Reply<Vec<CheckpointRecord>> },

    Shutdown,
}

#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<Command>,
}

impl StateManager {
    /// Open the store at `path`, run the crash-recovery sweep,
    /// and spawn the owning actor task.
    pub async fn spawn(path: PathBuf) -> Result<(Self, RecoveryReport)> {
        let (tx, mut rx) = mpsc::channel::<Command>(256);

        let mut store = Store::open(path)?;
        let report = sweep_for_orphaned_sessions(&mut store)?;
        info!(orphaned = report.orphaned_sessions.len(), "recovery sweep complete");

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                if matches!(cmd, Command::Shutdown) {
                    debug!("state manager shutting down");
                    break;
                }
                handle(&mut store, cmd);
            }
        });

        Ok((Self { tx }, report))
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }

    pub async fn create_project(&self, name: &str, working_directory: &str) -> Result<Project> {
        self.call(|reply| Command::CreateProject {
            name: name.to_string(),
            working_directory: working_directory.to_string(),
            reply,
        })
        .await
    }

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        self.call(|reply| Command::GetProject { id: id.to_string(), reply }).await
    }

    pub async fn list_projects(&self, include_deleted: bool) -> Result<Vec<Project>> {
        self.call(|reply| Command::ListProjects { include_deleted, reply }).await
    }

    pub async fn update_project(&self, id: &str, updates: HashMap<String, Value>) -> Result<Project> {
        self.call(|reply| Command::UpdateProject { id: id.to_string(), updates, reply }).await
    }

    pub async fn soft_delete_project(&self, id: &str) -> Result<()> {
        self.call(|reply| Command::SoftDeleteProject { id: id.to_string(), reply }).await
    }

    pub async fn create_work_item(&self, item: WorkItem) -> Result<WorkItem> {
        self.call(|reply| Command::CreateWorkItem { item, reply }).await
    }

    pub async fn get_work_item(&self, id: &str) -> Result<WorkItem> {
        self.call(|reply| Command::GetWorkItem { id: id.to_string(), reply }).await
    }

    pub async fn list_work_items(&self, project_id: &str, kind: WorkItemKind, include_deleted: bool) -> Result<Vec<WorkItem>> {
        self.call(|reply| Command::ListWorkItems {
            project_id: project_id.to_string(),
            kind,
            include_deleted,
            reply,
        })
        .await
    }

    pub async fn update_work_item(&self, id: &str, updates: HashMap<String, Value>) -> Result<WorkItem> {
        self.call(|reply| Command::UpdateWorkItem { id: id.to_string(), updates, reply }).await
    }

    pub async fn delete_work_item(&self, id: &str, soft: bool) -> Result<()> {
        self.call(|reply| Command::DeleteWorkItem { id: id.to_string(), soft, reply }).await
    }

    pub async fn delete_all_of(&self, project_id: &str, kind: WorkItemKind) -> Result<HashMap<WorkItemKind, usize>> {
        self.call(|reply| Command::DeleteAllOf { project_id: project_id.to_string(), kind, reply }).await
    }

    pub async fn create_session_record(&self, project_id: &str, milestone_id: Option<&str>) -> Result<Session> {
        self.call(|reply| Command::CreateSessionRecord {
            project_id: project_id.to_string(),
            milestone_id: milestone_id.map(str::to_string),
            reply,
        })
        .await
    }

    pub async fn get_session(&self, id: &str) -> Result<Session> {
        self.call(|reply| Command::GetSession { id: id.to_string(), reply }).await
    }

    pub async fn list_sessions_for_milestone(&self, milestone_id: &str) -> Result<Vec<Session>> {
        self.call(|reply| Command::ListSessionsForMilestone { milestone_id: milestone_id.to_string(), reply }).await
    }

    pub async fn complete_session_record(&self, id: &str) -> Result<()> {
        self.call(|reply| Command::CompleteSessionRecord { id: id.to_string(), reply }).await
    }

    pub async fn save_session_summary(&self, id: &str, summary: &str) -> Result<()> {
        self.call(|reply| Command::SaveSessionSummary { id: id.to_string(), summary: summary.to_string(), reply }).await
    }

    pub async fn refresh_session(&self, current_session_id: &str, summary: &str) -> Result<Session> {
        self.call(|reply| Command::RefreshSession {
            current_session_id: current_session_id.to_string(),
            summary: summary.to_string(),
            reply,
        })
        .await
    }

    pub async fn touch_session_heartbeat(&self, id: &str) -> Result<()> {
        self.call(|reply| Command::TouchSessionHeartbeat { id: id.to_string(), reply }).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record_token_usage(
        &self,
        session_id: &str,
        task_id: &str,
        input_tokens: i64,
        cache_creation_tokens: i64,
        cache_read_tokens: i64,
        output_tokens: i64,
    ) -> Result<TokenLedgerEntry> {
        self.call(|reply| Command::RecordTokenUsage {
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
            input_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            output_tokens,
            reply,
        })
        .await
    }

    pub async fn get_session_token_usage(&self, session_id: &str) -> Result<i64> {
        self.call(|reply| Command::GetSessionTokenUsage { session_id: session_id.to_string(), reply }).await
    }

    pub async fn append_interaction(&self, interaction: Interaction) -> Result<Interaction> {
        self.call(|reply| Command::AppendInteraction { interaction, reply }).await
    }

    pub async fn list_interactions_for_task(&self, task_id: &str) -> Result<Vec<Interaction>> {
        self.call(|reply| Command::ListInteractionsForTask { task_id: task_id.to_string(), reply }).await
    }

    pub async fn create_breakpoint(&self, task_id: &str, reason: BreakpointReason) -> Result<Breakpoint> {
        self.call(|reply| Command::CreateBreakpoint { task_id: task_id.to_string(), reason, reply }).await
    }

    pub async fn resolve_breakpoint(&self, id: &str, resolution: BreakpointResolution) -> Result<()> {
        self.call(|reply| Command::ResolveBreakpoint { id: id.to_string(), resolution, reply }).await
    }

    pub async fn unresolved_breakpoint_for_task(&self, task_id: &str) -> Result<Option<Breakpoint>> {
        self.call(|reply| Command::UnresolvedBreakpointForTask { task_id: task_id.to_string(), reply }).await
    }

    pub async fn register_checkpoint(&self, session_id: &str, trigger: CheckpointTrigger, artifact_ref: &str) -> Result<CheckpointRecord> {
        self.call(|reply| Command::RegisterCheckpoint {
            session_id: session_id.to_string(),
            trigger,
            artifact_ref: artifact_ref.to_string(),
            reply,
        })
        .await
    }

    pub async fn list_checkpoints_for_session(&self, session_id: &str) -> Result<Vec<CheckpointRecord>> {
        self.call(|reply| Command::ListCheckpointsForSession { session_id: session_id.to_string(), reply }).await
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::conflict("state_manager_call", "state manager actor has shut down"))?;
        reply_rx
            .await
            .map_err(|_| StoreError::conflict("state_manager_call", "state manager actor dropped the reply"))?
    }
}

fn handle(store: &mut Store, cmd: Command) {
    match cmd {
        Command::CreateProject { name, working_directory, reply } => {
            let _ = reply.send(store.create_project(&name, &working_directory));
        }
        Command::GetProject { id, reply } => {
            let _ = reply.send(store.get_project(&id));
        }
        Command::ListProjects { include_deleted, reply } => {
            let _ = reply.send(store.list_projects(include_deleted));
        }
        Command::UpdateProject { id, updates, reply } => {
            let _ = reply.send(store.update_project(&id, &updates));
        }
        Command::SoftDeleteProject { id, reply } => {
            let _ = reply.send(store.soft_delete_project(&id));
        }
        Command::CreateWorkItem { item, reply } => {
            let _ = reply.send(store.create_work_item(item));
        }
        Command::GetWorkItem { id, reply } => {
            let _ = reply.send(store.get_work_item(&id));
        }
        Command::ListWorkItems { project_id, kind, include_deleted, reply } => {
            let _ = reply.send(store.list_work_items(&project_id, kind, include_deleted));
        }
        Command::UpdateWorkItem { id, updates, reply } => {
            let _ = reply.send(store.update_work_item(&id, &updates));
        }
        Command::DeleteWorkItem { id, soft, reply } => {
            let _ = reply.send(store.delete_work_item(&id, soft));
        }
        Command::DeleteAllOf { project_id, kind, reply } => {
            let _ = reply.send(store.delete_all_of(&project_id, kind));
        }
        Command::CreateSessionRecord { project_id, milestone_id, reply } => {
            let _ = reply.send(store.create_session_record(&project_id, milestone_id.as_deref()));
        }
        Command::GetSession { id, reply } => {
            let _ = reply.send(store.get_session(&id));
        }
        Command::ListSessionsForMilestone { milestone_id, reply } => {
            let _ = reply.send(store.list_sessions_for_milestone(&milestone_id));
        }
        Command::CompleteSessionRecord { id, reply } => {
            let _ = reply.send(store.complete_session_record(&id));
        }
        Command::SaveSessionSummary { id, summary, reply } => {
            let _ = reply.send(store.save_session_summary(&id, &summary));
        }
        Command::RefreshSession { current_session_id, summary, reply } => {
            let _ = reply.send(store.refresh_session(&current_session_id, &summary));
        }
        Command::TouchSessionHeartbeat { id, reply } => {
            let _ = reply.send(store.touch_session_heartbeat(&id));
        }
        Command::RecordTokenUsage {
            session_id,
            task_id,
            input_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            output_tokens,
            reply,
        } => {
            let _ = reply.send(store.record_token_usage(&session_id, &task_id, input_tokens, cache_creation_tokens, cache_read_tokens, output_tokens));
        }
        Command::GetSessionTokenUsage { session_id, reply } => {
            let _ = reply.send(store.get_session_token_usage(&session_id));
        }
        Command::AppendInteraction { interaction, reply } => {
            let _ = reply.send(store.append_interaction(interaction));
        }
        Command::ListInteractionsForTask { task_id, reply } => {
            let _ = reply.send(store.list_interactions_for_task(&task_id));
        }
        Command::CreateBreakpoint { task_id, reason, reply } => {
            let _ = reply.send(store.create_breakpoint(&task_id, reason));
        }
        Command::ResolveBreakpoint { id, resolution, reply } => {
            let _ = reply.send(store.resolve_breakpoint(&id, resolution));
        }
        Command::UnresolvedBreakpointForTask { task_id, reply } => {
            let _ = reply.send(store.unresolved_breakpoint_for_task(&task_id));
        }
        Command::RegisterCheckpoint { session_id, trigger, artifact_ref, reply } => {
            let _ = reply.send(store.register_checkpoint(&session_id, trigger, &artifact_ref));
        }
        Command::ListCheckpointsForSession { session_id, reply } => {
            let _ = reply.send(store.list_checkpoints_for_session(&session_id));
        }
        Command::Shutdown => unreachable!("Shutdown is handled before dispatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn concurrent_calls_serialize_through_the_actor() {
        let temp = TempDir::new().unwrap();
        let (manager, _report) = StateManager::spawn(temp.path().join("state.db")).await.unwrap();

        let project = manager.create_project("P", "/tmp/p").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let manager = manager.clone();
            let project_id = project.id.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .create_work_item(WorkItem {
                        id: crate::id::generate_id(),
                        project_id,
                        kind: WorkItemKind::Task,
                        title: format!("task {i}"),
                        description: String::new(),
                        priority: Priority::MEDIUM,
                        status: WorkItemStatus::Pending,
                        parent_id: None,
                        dependencies: Vec::new(),
                        required_epics: Vec::new(),
                        is_deleted: false,
                        created_at: 0,
                        updated_at: 0,
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let tasks = manager.list_work_items(&project.id, WorkItemKind::Task, false).await.unwrap();
        assert_eq!(tasks.len(), 10);

        manager.shutdown().await;
    }
}
