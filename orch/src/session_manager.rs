//! SessionManager: continuity across tasks and mid-task refreshes.
//! Every session row lives in `statestore`; summarization goes through the
//! validator `ModelPort` so no raw chain-of-thought ever gets persisted.

use statestore::{SessionStatus, StateManager};

use crate::error::Result;
use crate::ports::ModelPort;

const SUMMARY_MAX_TOKENS: u32 = 1_200;

const SUMMARY_INSTRUCTION: &str = "Summarize this working session in under 1200 tokens. Cover: what was \
accomplished, key decisions, current code state, open issues, and next steps. Do not include raw \
chain-of-thought, internal deliberation, or secrets — decisions and results only.";

pub struct SessionManager<'a> {
    store: &'a StateManager,
    model: &'a dyn ModelPort,
}

impl<'a> SessionManager<'a> {
    pub fn new(store: &'a StateManager, model: &'a dyn ModelPort) -> Self {
        Self { store, model }
    }

    /// Creates a new ACTIVE session row. The caller assigns the returned id
    /// to the `AgentPort` context for the run.
    pub async fn start_milestone_session(&self, project_id: &str, milestone_id: Option<&str>) -> Result<String> {
        let session = self.store.create_session_record(project_id, milestone_id).await?;
        Ok(session.id)
    }

    /// Summarizes `recent_context` (caller-assembled: task description plus
    /// recent interaction text), persists the summary, and marks the session
    /// COMPLETED.
    pub async fn end_milestone_session(&self, session_id: &str, recent_context: &str) -> Result<String> {
        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n---\n{recent_context}");
        let summary = self.model.generate(&prompt, SUMMARY_MAX_TOKENS, 0.2).await;
        self.store.save_session_summary(session_id, &summary).await?;
        self.store.complete_session_record(session_id).await?;
        Ok(summary)
    }

    /// Assembles: project header + previous milestone summary (if any) +
    /// current milestone header.
    pub async fn build_milestone_context(&self, project_id: &str, milestone_id: Option<&str>) -> Result<String> {
        let project = self.store.get_project(project_id).await?;
        let mut sections = vec![format!("# Project: {}\nWorking directory: {}", project.name, project.working_directory)];

        if let Some(milestone_id) = milestone_id {
            if let Some(previous_summary) = self.previous_milestone_summary(milestone_id).await? {
                sections.push(format!("## Previous milestone summary\n{previous_summary}"));
            }
            let milestone = self.store.get_work_item(milestone_id).await?;
            sections.push(format!("## Current milestone: {}\n{}", milestone.title, milestone.description));
        }

        Ok(sections.join("\n\n"))
    }

    async fn previous_milestone_summary(&self, milestone_id: &str) -> Result<Option<String>> {
        let mut sessions = self.store.list_sessions_for_milestone(milestone_id).await?;
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions.into_iter().rev().find_map(|s| {
            matches!(s.status, SessionStatus::Completed | SessionStatus::Refreshed).then_some(s.summary).flatten()
        }))
    }

    /// Called when the Context Window Manager reports the orange zone: ends
    /// the outgoing session with a summary, opens a successor pointing at
    /// the same milestone, and returns both the new session id and the
    /// summary so the caller can prepend it to the next prompt.
    pub async fn refresh_session_with_summary(&self, current_session_id: &str, recent_context: &str) -> Result<(String, String)> {
        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n---\n{recent_context}");
        let summary = self.model.generate(&prompt, SUMMARY_MAX_TOKENS, 0.2).await;
        let new_session = self.store.refresh_session(current_session_id, &summary).await?;
        Ok((new_session.id, summary))
    }

    /// Appends an `AgentResult`'s tokens to the session ledger (cache-read
    /// tokens are still recorded for bookkeeping but excluded from the
    /// windowed total the Context Window Manager checks).
    pub async fn record_tokens(&self, session_id: &str, task_id: &str, result: &crate::ports::AgentResult) -> Result<i64> {
        self.store
            .record_token_usage(
                session_id,
                task_id,
                result.input_tokens as i64,
                result.cache_creation_tokens as i64,
                result.cache_read_tokens as i64,
                result.output_tokens as i64,
            )
            .await?;
        Ok(self.store.get_session_token_usage(session_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model::mock::ScriptedModel;
    use crate::ports::AgentResult;
    use crate::error::ExitReason;

    async fn store() -> (tempfile::TempDir, StateManager) {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _report) = StateManager::spawn(dir.path().join("state.db")).await.expect("spawn store");
        (dir, store)
    }

    #[tokio::test]
    async fn start_creates_active_session() {
        let (_dir, store) = store().await;
        let project = store.create_project("proj", "/tmp/proj").await.unwrap();
        let model = ScriptedModel::new(vec!["summary"]);
        let manager = SessionManager::new(&store, &model);

        let session_id = manager.start_milestone_session(&project.id, None).await.unwrap();
        let session = store.get_session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn end_session_persists_summary_and_completes() {
        let (_dir, store) = store().await;
        let project = store.create_project("proj", "/tmp/proj").await.unwrap();
        let model = ScriptedModel::new(vec!["accomplished X, decided Y"]);
        let manager = SessionManager::new(&store, &model);

        let session_id = manager.start_milestone_session(&project.id, None).await.unwrap();
        let summary = manager.end_milestone_session(&session_id, "did some work").await.unwrap();
        assert_eq!(summary, "accomplished X, decided Y");

        let session = store.get_session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.summary.as_deref(), Some("accomplished X, decided Y"));
    }

    #[tokio::test]
    async fn refresh_preserves_milestone_and_opens_successor() {
        let (_dir, store) = store().await;
        let project = store.create_project("proj", "/tmp/proj").await.unwrap();
        let milestone = store
            .create_work_item(statestore::WorkItem {
                id: statestore::generate_id(),
                project_id: project.id.clone(),
                kind: statestore::WorkItemKind::Milestone,
                title: "M1".to_string(),
                description: "first milestone".to_string(),
                priority: statestore::Priority::MEDIUM,
                status: statestore::WorkItemStatus::Pending,
                parent_id: None,
                dependencies: vec![],
                required_epics: vec![],
                is_deleted: false,
                created_at: 0,
                updated_at: 0,
            })
            .await
            .unwrap();
        let model = ScriptedModel::new(vec!["refresh summary"]);
        let manager = SessionManager::new(&store, &model);

        let old_session_id = manager.start_milestone_session(&project.id, Some(&milestone.id)).await.unwrap();
        let (new_session_id, summary) = manager.refresh_session_with_summary(&old_session_id, "context so far").await.unwrap();
        assert_ne!(old_session_id, new_session_id);
        assert_eq!(summary, "refresh summary");

        let old_session = store.get_session(&old_session_id).await.unwrap();
        assert_eq!(old_session.status, SessionStatus::Refreshed);
        let new_session = store.get_session(&new_session_id).await.unwrap();
        assert_eq!(new_session.milestone_id.as_deref(), Some(milestone.id.as_str()));
    }

    #[tokio::test]
    async fn record_tokens_excludes_cache_reads_from_windowed_total_but_not_ledger() {
        let (_dir, store) = store().await;
        let project = store.create_project("proj", "/tmp/proj").await.unwrap();
        let model = ScriptedModel::new(vec![]);
        let manager = SessionManager::new(&store, &model);
        let session_id = manager.start_milestone_session(&project.id, None).await.unwrap();

        let result = AgentResult {
            text: "done".to_string(),
            input_tokens: 100,
            cache_creation_tokens: 10,
            cache_read_tokens: 500,
            output_tokens: 50,
            turns_used: 3,
            duration_ms: 10,
            exit_reason: ExitReason::Ok,
        };
        assert_eq!(result.windowed_tokens(), 160);

        let total = manager.record_tokens(&session_id, "task-1", &result).await.unwrap();
        assert_eq!(total, 160, "the 500 cache-read tokens must not count toward the windowed total");
    }
}
