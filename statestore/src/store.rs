//! The state store: a single-writer, multi-reader SQLite-backed
//! implementation of the StatePort contract.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::domain::*;
use crate::error::{Result, StoreError};
use crate::id::generate_id;
use crate::schema;

pub struct Store {
    conn: Connection,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn json_ids(ids: &[String]) -> String {
    serde_json::to_string(ids).expect("Vec<String> always serializes")
}

fn parse_ids(op: &'static str, text: &str) -> Result<Vec<String>> {
    serde_json::from_str(text).map_err(|e| StoreError::serialization(op, e))
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| StoreError::sql("open", e))?;
        conn.pragma_update(None, "foreign_keys", true).map_err(|e| StoreError::sql("open", e))?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::sql("open_in_memory", e))?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    // ---- Project ----------------------------------------------------

    pub fn create_project(&self, name: &str, working_directory: &str) -> Result<Project> {
        let project = Project {
            id: generate_id(),
            name: name.to_string(),
            working_directory: working_directory.to_string(),
            status: ProjectStatus::Active,
            is_deleted: false,
            created_at: now_ms(),
            updated_at: now_ms(),
        };

        self.conn
            .execute(
                "INSERT INTO projects (id, name, working_directory, status, is_deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project.id,
                    project.name,
                    project.working_directory,
                    project.status.as_str(),
                    project.is_deleted,
                    project.created_at,
                    project.updated_at
                ],
            )
            .map_err(|e| StoreError::sql("create_project", e))?;

        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Project> {
        self.conn
            .query_row(
                "SELECT id, name, working_directory, status, is_deleted, created_at, updated_at
                 FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .optional()
            .map_err(|e| StoreError::sql("get_project", e))?
            .ok_or_else(|| StoreError::not_found("get_project", id))
    }

    pub fn list_projects(&self, include_deleted: bool) -> Result<Vec<Project>> {
        let sql = if include_deleted {
            "SELECT id, name, working_directory, status, is_deleted, created_at, updated_at FROM projects"
        } else {
            "SELECT id, name, working_directory, status, is_deleted, created_at, updated_at FROM projects WHERE is_deleted = 0"
        };
        let mut stmt = self.conn.prepare(sql).map_err(|e| StoreError::sql("list_projects", e))?;
        let rows = stmt
            .query_map([], row_to_project)
            .map_err(|e| StoreError::sql("list_projects", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| StoreError::sql("list_projects", e))
    }

    /// Whitelisted field update; unknown keys are ignored, not errors.
    pub fn update_project(&self, id: &str, updates: &HashMap<String, Value>) -> Result<Project> {
        let mut project = self.get_project(id)?;

        if let Some(Value::String(name)) = updates.get("name") {
            project.name = name.clone();
        }
        if let Some(Value::String(status)) = updates.get("status")
            && let Some(status) = ProjectStatus::parse(status)
        {
            project.status = status;
        }
        project.updated_at = now_ms();

        self.conn
            .execute(
                "UPDATE projects SET name = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![project.name, project.status.as_str(), project.updated_at, id],
            )
            .map_err(|e| StoreError::sql("update_project", e))?;

        Ok(project)
    }

    pub fn soft_delete_project(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE projects SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
                params![now_ms(), id],
            )
            .map_err(|e| StoreError::sql("soft_delete_project", e))?;
        if changed == 0 {
            return Err(StoreError::not_found("soft_delete_project", id));
        }
        Ok(())
    }

    // ---- Work items ---------------------------------------------------

    pub fn create_work_item(&self, item: WorkItem) -> Result<WorkItem> {
        if item.id == ALL_SENTINEL {
            return Err(StoreError::invalid("create_work_item", "__ALL__ is a reserved sentinel, not a valid id"));
        }
        if !item.dependencies.is_empty() {
            self.assert_acyclic(&item.id, &item.dependencies)?;
        }

        self.conn
            .execute(
                "INSERT INTO work_items
                 (id, project_id, kind, title, description, priority, status, parent_id,
                  dependencies, required_epics, is_deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    item.id,
                    item.project_id,
                    item.kind.as_str(),
                    item.title,
                    item.description,
                    item.priority.0,
                    item.status.as_str(),
                    item.parent_id,
                    json_ids(&item.dependencies),
                    json_ids(&item.required_epics),
                    item.is_deleted,
                    item.created_at,
                    item.updated_at
                ],
            )
            .map_err(|e| StoreError::sql("create_work_item", e))?;

        Ok(item)
    }

    pub fn get_work_item(&self, id: &str) -> Result<WorkItem> {
        self.conn
            .query_row(
                "SELECT id, project_id, kind, title, description, priority, status, parent_id,
                        dependencies, required_epics, is_deleted, created_at, updated_at
                 FROM work_items WHERE id = ?1",
                params![id],
                row_to_work_item,
            )
            .optional()
            .map_err(|e| StoreError::sql("get_work_item", e))?
            .ok_or_else(|| StoreError::not_found("get_work_item", id))?
    }

    pub fn list_work_items(&self, project_id: &str, kind: WorkItemKind, include_deleted: bool) -> Result<Vec<WorkItem>> {
        let sql = if include_deleted {
            "SELECT id, project_id, kind, title, description, priority, status, parent_id,
                    dependencies, required_epics, is_deleted, created_at, updated_at
             FROM work_items WHERE project_id = ?1 AND kind = ?2"
        } else {
            "SELECT id, project_id, kind, title, description, priority, status, parent_id,
                    dependencies, required_epics, is_deleted, created_at, updated_at
             FROM work_items WHERE project_id = ?1 AND kind = ?2 AND is_deleted = 0"
        };
        let mut stmt = self.conn.prepare(sql).map_err(|e| StoreError::sql("list_work_items", e))?;
        let rows = stmt
            .query_map(params![project_id, kind.as_str()], row_to_work_item)
            .map_err(|e| StoreError::sql("list_work_items", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| StoreError::sql("list_work_items", e))??);
        }
        Ok(out)
    }

    /// Whitelisted field update —
    /// unknown fields are ignored, not errors. A transition to RUNNING is
    /// rejected unless every dependency is COMPLETED.
    pub fn update_work_item(&self, id: &str, updates: &HashMap<String, Value>) -> Result<WorkItem> {
        let mut item = self.get_work_item(id)?;

        if let Some(Value::String(title)) = updates.get("title") {
            item.title = title.clone();
        }
        if let Some(Value::String(description)) = updates.get("description") {
            item.description = description.clone();
        }
        if let Some(Value::Number(priority)) = updates.get("priority")
            && let Some(priority) = priority.as_u64()
        {
            item.priority = Priority::clamped(priority as u8);
        }
        if let Some(Value::String(status)) = updates.get("status")
            && let Some(status) = WorkItemStatus::parse(status)
        {
            if status == WorkItemStatus::Running {
                self.assert_dependencies_completed(&item.dependencies)?;
            }
            item.status = status;
        }
        if let Some(Value::Array(deps)) = updates.get("dependencies") {
            let deps: Vec<String> = deps.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            self.assert_acyclic(&item.id, &deps)?;
            item.dependencies = deps;
        }
        item.updated_at = now_ms();

        self.conn
            .execute(
                "UPDATE work_items SET title = ?1, description = ?2, priority = ?3, status = ?4,
                    dependencies = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    item.title,
                    item.description,
                    item.priority.0,
                    item.status.as_str(),
                    json_ids(&item.dependencies),
                    item.updated_at,
                    id
                ],
            )
            .map_err(|e| StoreError::sql("update_work_item", e))?;

        Ok(item)
    }

    /// Soft (default) or hard delete of an item and every transitive child
    /// reachable through `parent_id`, deleted child-first within a single
    /// transaction.
    pub fn delete_work_item(&mut self, id: &str, soft: bool) -> Result<()> {
        let tx = self.conn.transaction().map_err(|e| StoreError::sql("delete_work_item", e))?;

        // Breadth-first walk from the named item; visiting the collected ids
        // in reverse deletes children before their parents.
        let mut ordered = vec![id.to_string()];
        let mut cursor = 0;
        while cursor < ordered.len() {
            let parent = ordered[cursor].clone();
            cursor += 1;
            let mut stmt = tx
                .prepare("SELECT id FROM work_items WHERE parent_id = ?1")
                .map_err(|e| StoreError::sql("delete_work_item", e))?;
            let children = stmt
                .query_map(params![parent], |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::sql("delete_work_item", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| StoreError::sql("delete_work_item", e))?;
            ordered.extend(children);
        }

        for target in ordered.iter().rev() {
            let changed = if soft {
                tx.execute(
                    "UPDATE work_items SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
                    params![now_ms(), target],
                )
            } else {
                tx.execute("DELETE FROM work_items WHERE id = ?1", params![target])
            }
            .map_err(|e| StoreError::sql("delete_work_item", e))?;

            if changed == 0 && target.as_str() == id {
                return Err(StoreError::not_found("delete_work_item", id));
            }
        }

        tx.commit().map_err(|e| StoreError::sql("delete_work_item", e))
    }

    /// Cascading bulk delete of every item of `kind` in `project_id`,
    /// expanding to child kinds first (Subtasks → Tasks → Stories → Epics)
    /// when `kind` is a container kind. Returns the count deleted per kind.
    /// The whole operation is one transaction; on failure the per-tier
    /// counts accumulated so far are returned alongside the error.
    pub fn delete_all_of(&mut self, project_id: &str, kind: WorkItemKind) -> Result<HashMap<WorkItemKind, usize>> {
        let full_order = WorkItemKind::cascade_order();
        let order: Vec<WorkItemKind> = match full_order.iter().position(|k| *k == kind) {
            Some(idx) => full_order[..=idx].to_vec(),
            None => vec![kind],
        };

        let tx = self.conn.transaction().map_err(|e| StoreError::sql("delete_all_of", e))?;
        let mut counts = HashMap::new();

        for tier in order {
            let count: usize = tx
                .query_row(
                    "SELECT COUNT(*) FROM work_items WHERE project_id = ?1 AND kind = ?2 AND is_deleted = 0",
                    params![project_id, tier.as_str()],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(|e| StoreError::sql("delete_all_of", e))? as usize;

            if count > 0 {
                tx.execute(
                    "UPDATE work_items SET is_deleted = 1, updated_at = ?1 WHERE project_id = ?2 AND kind = ?3 AND is_deleted = 0",
                    params![now_ms(), project_id, tier.as_str()],
                )
                .map_err(|_| StoreError::TransactionAborted {
                    op: "delete_all_of",
                    reason: format!("failed deleting tier {tier:?} after {counts:?}"),
                })?;
            }
            counts.insert(tier, count);
        }

        tx.commit().map_err(|e| StoreError::sql("delete_all_of", e))?;
        Ok(counts)
    }

    fn assert_dependencies_completed(&self, dependencies: &[String]) -> Result<()> {
        for dep_id in dependencies {
            let dep = self.get_work_item(dep_id)?;
            if dep.status != WorkItemStatus::Completed {
                return Err(StoreError::conflict(
                    "assert_dependencies_completed",
                    format!("dependency {dep_id} is not COMPLETED"),
                ));
            }
        }
        Ok(())
    }

    /// Depth-first cycle check: would adding `new_deps` to `item_id` create a
    /// cycle in the dependency graph?
    fn assert_acyclic(&self, item_id: &str, new_deps: &[String]) -> Result<()> {
        let mut visited = std::collections::HashSet::new();
        let mut stack: Vec<String> = new_deps.to_vec();

        while let Some(current) = stack.pop() {
            if current == item_id {
                return Err(StoreError::conflict("assert_acyclic", format!("dependency graph cycle through {item_id}")));
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Ok(node) = self.get_work_item(&current) {
                stack.extend(node.dependencies);
            }
        }
        Ok(())
    }

    // ---- Sessions -------------------------------------------------------

    pub fn create_session_record(&self, project_id: &str, milestone_id: Option<&str>) -> Result<Session> {
        if let Some(milestone_id) = milestone_id
            && self.get_active_session(milestone_id)?.is_some()
        {
            return Err(StoreError::conflict("create_session_record", "an ACTIVE session already exists for this milestone"));
        }

        let session = Session {
            id: generate_id(),
            project_id: project_id.to_string(),
            milestone_id: milestone_id.map(str::to_string),
            started_at: now_ms(),
            ended_at: None,
            status: SessionStatus::Active,
            total_tokens: 0,
            total_turns: 0,
            summary: None,
            last_heartbeat_at: now_ms(),
        };

        self.conn
            .execute(
                "INSERT INTO sessions (id, project_id, milestone_id, started_at, ended_at, status,
                    total_tokens, total_turns, summary, last_heartbeat_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    session.id,
                    session.project_id,
                    session.milestone_id,
                    session.started_at,
                    session.ended_at,
                    session.status.as_str(),
                    session.total_tokens,
                    session.total_turns,
                    session.summary,
                    session.last_heartbeat_at
                ],
            )
            .map_err(|e| StoreError::sql("create_session_record", e))?;

        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        self.conn
            .query_row(
                "SELECT id, project_id, milestone_id, started_at, ended_at, status,
                        total_tokens, total_turns, summary, last_heartbeat_at
                 FROM sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()
            .map_err(|e| StoreError::sql("get_session", e))?
            .ok_or_else(|| StoreError::not_found("get_session", id))
    }

    pub fn get_active_session(&self, milestone_id: &str) -> Result<Option<Session>> {
        self.conn
            .query_row(
                "SELECT id, project_id, milestone_id, started_at, ended_at, status,
                        total_tokens, total_turns, summary, last_heartbeat_at
                 FROM sessions WHERE milestone_id = ?1 AND status = 'ACTIVE'",
                params![milestone_id],
                row_to_session,
            )
            .optional()
            .map_err(|e| StoreError::sql("get_active_session", e))
    }

    pub fn list_sessions_for_milestone(&self, milestone_id: &str) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, milestone_id, started_at, ended_at, status,
                        total_tokens, total_turns, summary, last_heartbeat_at
                 FROM sessions WHERE milestone_id = ?1 ORDER BY started_at",
            )
            .map_err(|e| StoreError::sql("list_sessions_for_milestone", e))?;
        let rows = stmt
            .query_map(params![milestone_id], row_to_session)
            .map_err(|e| StoreError::sql("list_sessions_for_milestone", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| StoreError::sql("list_sessions_for_milestone", e))
    }

    /// Lists every session currently ACTIVE, for the crash-recovery sweep.
    pub fn list_active_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, milestone_id, started_at, ended_at, status,
                        total_tokens, total_turns, summary, last_heartbeat_at
                 FROM sessions WHERE status = 'ACTIVE'",
            )
            .map_err(|e| StoreError::sql("list_active_sessions", e))?;
        let rows = stmt.query_map([], row_to_session).map_err(|e| StoreError::sql("list_active_sessions", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| StoreError::sql("list_active_sessions", e))
    }

    pub fn mark_session_abandoned(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sessions SET status = 'ABANDONED', ended_at = ?1 WHERE id = ?2",
                params![now_ms(), id],
            )
            .map_err(|e| StoreError::sql("mark_session_abandoned", e))?;
        Ok(())
    }

    pub fn touch_session_heartbeat(&self, id: &str) -> Result<()> {
        self.conn
            .execute("UPDATE sessions SET last_heartbeat_at = ?1 WHERE id = ?2", params![now_ms(), id])
            .map_err(|e| StoreError::sql("touch_session_heartbeat", e))?;
        Ok(())
    }

    pub fn complete_session_record(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE sessions SET status = 'COMPLETED', ended_at = ?1 WHERE id = ?2",
                params![now_ms(), id],
            )
            .map_err(|e| StoreError::sql("complete_session_record", e))?;
        if changed == 0 {
            return Err(StoreError::not_found("complete_session_record", id));
        }
        Ok(())
    }

    pub fn save_session_summary(&self, id: &str, summary: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("UPDATE sessions SET summary = ?1 WHERE id = ?2", params![summary, id])
            .map_err(|e| StoreError::sql("save_session_summary", e))?;
        if changed == 0 {
            return Err(StoreError::not_found("save_session_summary", id));
        }
        Ok(())
    }

    pub fn read_summary(&self, id: &str) -> Result<Option<String>> {
        Ok(self.get_session(id)?.summary)
    }

    /// Refresh: mark `current_session_id` REFRESHED with `summary`, open a
    /// new ACTIVE session for the same milestone, in one transaction.
    pub fn refresh_session(&mut self, current_session_id: &str, summary: &str) -> Result<Session> {
        let tx = self.conn.transaction().map_err(|e| StoreError::sql("refresh_session", e))?;

        let (project_id, milestone_id): (String, Option<String>) = tx
            .query_row(
                "SELECT project_id, milestone_id FROM sessions WHERE id = ?1",
                params![current_session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| StoreError::sql("refresh_session", e))?
            .ok_or_else(|| StoreError::not_found("refresh_session", current_session_id))?;

        tx.execute(
            "UPDATE sessions SET status = 'REFRESHED', summary = ?1, ended_at = ?2 WHERE id = ?3",
            params![summary, now_ms(), current_session_id],
        )
        .map_err(|e| StoreError::sql("refresh_session", e))?;

        let new_session = Session {
            id: generate_id(),
            project_id,
            milestone_id,
            started_at: now_ms(),
            ended_at: None,
            status: SessionStatus::Active,
            total_tokens: 0,
            total_turns: 0,
            summary: None,
            last_heartbeat_at: now_ms(),
        };

        tx.execute(
            "INSERT INTO sessions (id, project_id, milestone_id, started_at, ended_at, status,
                total_tokens, total_turns, summary, last_heartbeat_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new_session.id,
                new_session.project_id,
                new_session.milestone_id,
                new_session.started_at,
                new_session.ended_at,
                new_session.status.as_str(),
                new_session.total_tokens,
                new_session.total_turns,
                new_session.summary,
                new_session.last_heartbeat_at
            ],
        )
        .map_err(|e| StoreError::sql("refresh_session", e))?;

        tx.commit().map_err(|e| StoreError::sql("refresh_session", e))?;
        Ok(new_session)
    }

    // ---- Token ledger ---------------------------------------------------

    pub fn record_token_usage(
        &self,
        session_id: &str,
        task_id: &str,
        input_tokens: i64,
        cache_creation_tokens: i64,
        cache_read_tokens: i64,
        output_tokens: i64,
    ) -> Result<TokenLedgerEntry> {
        let entry = TokenLedgerEntry {
            id: generate_id(),
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
            timestamp: now_ms(),
            input_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            output_tokens,
            total_tokens: TokenLedgerEntry::windowed_total(input_tokens, cache_creation_tokens, output_tokens),
        };

        self.conn
            .execute(
                "INSERT INTO token_ledger (id, session_id, task_id, timestamp, input_tokens,
                    cache_creation_tokens, cache_read_tokens, output_tokens, total_tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id,
                    entry.session_id,
                    entry.task_id,
                    entry.timestamp,
                    entry.input_tokens,
                    entry.cache_creation_tokens,
                    entry.cache_read_tokens,
                    entry.output_tokens,
                    entry.total_tokens
                ],
            )
            .map_err(|e| StoreError::sql("record_token_usage", e))?;

        self.conn
            .execute(
                "UPDATE sessions SET total_tokens = total_tokens + ?1 WHERE id = ?2",
                params![entry.total_tokens, session_id],
            )
            .map_err(|e| StoreError::sql("record_token_usage", e))?;

        Ok(entry)
    }

    /// Sum aggregate over the ledger; authoritative for threshold checks
    /// (must equal the running `sessions.total_tokens` counter).
    pub fn get_session_token_usage(&self, session_id: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(total_tokens), 0) FROM token_ledger WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::sql("get_session_token_usage", e))
    }

    // ---- Interactions ---------------------------------------------------

    pub fn append_interaction(&self, interaction: Interaction) -> Result<Interaction> {
        let metadata = serde_json::to_string(&interaction.metadata).map_err(|e| StoreError::serialization("append_interaction", e))?;

        self.conn
            .execute(
                "INSERT INTO interactions (id, project_id, task_id, session_id, iteration, prompt, response, timestamp, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    interaction.id,
                    interaction.project_id,
                    interaction.task_id,
                    interaction.session_id,
                    interaction.iteration,
                    interaction.prompt,
                    interaction.response,
                    interaction.timestamp,
                    metadata
                ],
            )
            .map_err(|e| StoreError::sql("append_interaction", e))?;

        self.conn
            .execute("UPDATE sessions SET total_turns = total_turns + 1 WHERE id = ?1", params![interaction.session_id])
            .map_err(|e| StoreError::sql("append_interaction", e))?;

        Ok(interaction)
    }

    pub fn list_interactions_for_task(&self, task_id: &str) -> Result<Vec<Interaction>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, task_id, session_id, iteration, prompt, response, timestamp, metadata
                 FROM interactions WHERE task_id = ?1 ORDER BY iteration",
            )
            .map_err(|e| StoreError::sql("list_interactions_for_task", e))?;
        let rows = stmt
            .query_map(params![task_id], row_to_interaction)
            .map_err(|e| StoreError::sql("list_interactions_for_task", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| StoreError::sql("list_interactions_for_task", e))??);
        }
        Ok(out)
    }

    // ---- Breakpoints ------------------------------------------------

    pub fn create_breakpoint(&self, task_id: &str, reason: BreakpointReason) -> Result<Breakpoint> {
        let bp = Breakpoint {
            id: generate_id(),
            task_id: task_id.to_string(),
            reason,
            triggered_at: now_ms(),
            resolved_at: None,
            resolution: None,
        };

        self.conn
            .execute(
                "INSERT INTO breakpoints (id, task_id, reason, triggered_at, resolved_at, resolution)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![bp.id, bp.task_id, bp.reason.as_str(), bp.triggered_at, bp.resolved_at, bp.resolution.map(|r| r.as_str())],
            )
            .map_err(|e| StoreError::sql("create_breakpoint", e))?;

        Ok(bp)
    }

    pub fn resolve_breakpoint(&self, id: &str, resolution: BreakpointResolution) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE breakpoints SET resolved_at = ?1, resolution = ?2 WHERE id = ?3",
                params![now_ms(), resolution.as_str(), id],
            )
            .map_err(|e| StoreError::sql("resolve_breakpoint", e))?;
        if changed == 0 {
            return Err(StoreError::not_found("resolve_breakpoint", id));
        }
        Ok(())
    }

    pub fn unresolved_breakpoint_for_task(&self, task_id: &str) -> Result<Option<Breakpoint>> {
        self.conn
            .query_row(
                "SELECT id, task_id, reason, triggered_at, resolved_at, resolution
                 FROM breakpoints WHERE task_id = ?1 AND resolved_at IS NULL LIMIT 1",
                params![task_id],
                row_to_breakpoint,
            )
            .optional()
            .map_err(|e| StoreError::sql("unresolved_breakpoint_for_task", e))?
            .transpose()
    }

    // ---- Checkpoint registry ------------------------------------------

    pub fn register_checkpoint(&self, session_id: &str, trigger: CheckpointTrigger, artifact_ref: &str) -> Result<CheckpointRecord> {
        let record = CheckpointRecord {
            id: generate_id(),
            session_id: session_id.to_string(),
            created_at: now_ms(),
            trigger,
            artifact_ref: artifact_ref.to_string(),
        };

        self.conn
            .execute(
                "INSERT INTO checkpoints (id, session_id, created_at, trigger_code, artifact_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![record.id, record.session_id, record.created_at, record.trigger.as_str(), record.artifact_ref],
            )
            .map_err(|e| StoreError::sql("register_checkpoint", e))?;

        Ok(record)
    }

    #[cfg(test)]
    pub fn conn_for_test(&self) -> &Connection {
        &self.conn
    }

    pub fn list_checkpoints_for_session(&self, session_id: &str) -> Result<Vec<CheckpointRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, session_id, created_at, trigger_code, artifact_ref
                 FROM checkpoints WHERE session_id = ?1 ORDER BY created_at",
            )
            .map_err(|e| StoreError::sql("list_checkpoints_for_session", e))?;
        let rows = stmt
            .query_map(params![session_id], row_to_checkpoint)
            .map_err(|e| StoreError::sql("list_checkpoints_for_session", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| StoreError::sql("list_checkpoints_for_session", e))?);
        }
        Ok(out)
    }
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let status: String = row.get(3)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        working_directory: row.get(2)?,
        status: ProjectStatus::parse(&status).unwrap_or(ProjectStatus::Active),
        is_deleted: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_work_item(row: &rusqlite::Row) -> rusqlite::Result<Result<WorkItem>> {
    let kind: String = row.get(2)?;
    let status: String = row.get(6)?;
    let priority: u8 = row.get(5)?;
    let deps_text: String = row.get(8)?;
    let required_epics_text: String = row.get(9)?;

    Ok((|| -> Result<WorkItem> {
        Ok(WorkItem {
            id: row.get(0)?,
            project_id: row.get(1)?,
            kind: WorkItemKind::parse(&kind).unwrap_or(WorkItemKind::Task),
            title: row.get(3)?,
            description: row.get(4)?,
            priority: Priority::clamped(priority),
            status: WorkItemStatus::parse(&status).unwrap_or(WorkItemStatus::Pending),
            parent_id: row.get(7)?,
            dependencies: parse_ids("row_to_work_item", &deps_text)?,
            required_epics: parse_ids("row_to_work_item", &required_epics_text)?,
            is_deleted: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    })())
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let status: String = row.get(5)?;
    Ok(Session {
        id: row.get(0)?,
        project_id: row.get(1)?,
        milestone_id: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Active),
        total_tokens: row.get(6)?,
        total_turns: row.get(7)?,
        summary: row.get(8)?,
        last_heartbeat_at: row.get(9)?,
    })
}

fn row_to_interaction(row: &rusqlite::Row) -> rusqlite::Result<Result<Interaction>> {
    let metadata_text: String = row.get(8)?;
    Ok((|| -> Result<Interaction> {
        Ok(Interaction {
            id: row.get(0)?,
            project_id: row.get(1)?,
            task_id: row.get(2)?,
            session_id: row.get(3)?,
            iteration: row.get(4)?,
            prompt: row.get(5)?,
            response: row.get(6)?,
            timestamp: row.get(7)?,
            metadata: serde_json::from_str(&metadata_text).map_err(|e| StoreError::serialization("row_to_interaction", e))?,
        })
    })())
}

fn row_to_breakpoint(row: &rusqlite::Row) -> rusqlite::Result<Result<Breakpoint>> {
    let reason: String = row.get(2)?;
    let resolution: Option<String> = row.get(5)?;
    Ok(Ok(Breakpoint {
        id: row.get(0)?,
        task_id: row.get(1)?,
        reason: BreakpointReason::parse(&reason).unwrap_or(BreakpointReason::ExplicitRequest),
        triggered_at: row.get(3)?,
        resolved_at: row.get(4)?,
        resolution: resolution.and_then(|r| BreakpointResolution::parse(&r)),
    }))
}

fn row_to_checkpoint(row: &rusqlite::Row) -> rusqlite::Result<CheckpointRecord> {
    let trigger: String = row.get(3)?;
    Ok(CheckpointRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        created_at: row.get(2)?,
        trigger: CheckpointTrigger::parse(&trigger).unwrap_or(CheckpointTrigger::Manual),
        artifact_ref: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_item(project_id: &str, kind: WorkItemKind, parent_id: Option<&str>) -> WorkItem {
        let now = now_ms();
        WorkItem {
            id: generate_id(),
            project_id: project_id.to_string(),
            kind,
            title: format!("{kind:?} title"),
            description: String::new(),
            priority: Priority::MEDIUM,
            status: WorkItemStatus::Pending,
            parent_id: parent_id.map(str::to_string),
            dependencies: Vec::new(),
            required_epics: Vec::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_get_project_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("TestProj", "/tmp/testproj").unwrap();
        let fetched = store.get_project(&project.id).unwrap();
        assert_eq!(fetched.name, "TestProj");
        assert_eq!(fetched.status, ProjectStatus::Active);
    }

    #[test]
    fn all_sentinel_is_rejected_as_an_id() {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let mut item = sample_item(&project.id, WorkItemKind::Epic, None);
        item.id = ALL_SENTINEL.to_string();
        assert!(store.create_work_item(item).is_err());
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let a = store.create_work_item(sample_item(&project.id, WorkItemKind::Task, None)).unwrap();
        let mut b = sample_item(&project.id, WorkItemKind::Task, None);
        b.dependencies = vec![a.id.clone()];
        let b = store.create_work_item(b).unwrap();

        let mut updates = HashMap::new();
        updates.insert("dependencies".to_string(), Value::Array(vec![Value::String(b.id.clone())]));
        let result = store.update_work_item(&a.id, &updates);
        assert!(result.is_err());
    }

    #[test]
    fn running_requires_completed_dependencies() {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let dep = store.create_work_item(sample_item(&project.id, WorkItemKind::Task, None)).unwrap();
        let mut item = sample_item(&project.id, WorkItemKind::Task, None);
        item.dependencies = vec![dep.id.clone()];
        let item = store.create_work_item(item).unwrap();

        let mut updates = HashMap::new();
        updates.insert("status".to_string(), Value::String("RUNNING".to_string()));
        assert!(store.update_work_item(&item.id, &updates).is_err());

        let mut complete = HashMap::new();
        complete.insert("status".to_string(), Value::String("COMPLETED".to_string()));
        store.update_work_item(&dep.id, &complete).unwrap();

        assert!(store.update_work_item(&item.id, &updates).is_ok());
    }

    #[test]
    fn cascading_delete_counts_each_tier_child_first() {
        let mut store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let epic = store.create_work_item(sample_item(&project.id, WorkItemKind::Epic, None)).unwrap();
        let story = store.create_work_item(sample_item(&project.id, WorkItemKind::Story, Some(&epic.id))).unwrap();
        store.create_work_item(sample_item(&project.id, WorkItemKind::Task, Some(&story.id))).unwrap();

        let counts = store.delete_all_of(&project.id, WorkItemKind::Epic).unwrap();
        assert_eq!(counts[&WorkItemKind::Epic], 1);
        assert_eq!(counts[&WorkItemKind::Story], 1);
        assert_eq!(counts[&WorkItemKind::Task], 1);
        assert_eq!(counts[&WorkItemKind::Subtask], 0);

        let remaining = store.list_work_items(&project.id, WorkItemKind::Epic, false).unwrap();
        assert!(remaining.is_empty());
        let including_deleted = store.list_work_items(&project.id, WorkItemKind::Epic, true).unwrap();
        assert_eq!(including_deleted.len(), 1);
    }

    #[test]
    fn deleting_one_parent_cascades_to_its_transitive_children() {
        let mut store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let epic = store.create_work_item(sample_item(&project.id, WorkItemKind::Epic, None)).unwrap();
        let story = store.create_work_item(sample_item(&project.id, WorkItemKind::Story, Some(&epic.id))).unwrap();
        let task = store.create_work_item(sample_item(&project.id, WorkItemKind::Task, Some(&story.id))).unwrap();
        let sibling = store.create_work_item(sample_item(&project.id, WorkItemKind::Epic, None)).unwrap();

        store.delete_work_item(&epic.id, true).unwrap();

        assert!(store.list_work_items(&project.id, WorkItemKind::Story, false).unwrap().is_empty());
        assert!(store.list_work_items(&project.id, WorkItemKind::Task, false).unwrap().is_empty());
        let live_epics = store.list_work_items(&project.id, WorkItemKind::Epic, false).unwrap();
        assert_eq!(live_epics.len(), 1);
        assert_eq!(live_epics[0].id, sibling.id);

        // Soft delete keeps the rows, flagged.
        assert!(store.get_work_item(&task.id).unwrap().is_deleted);
        assert!(store.get_work_item(&story.id).unwrap().is_deleted);
    }

    #[test]
    fn hard_delete_removes_the_whole_subtree() {
        let mut store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let story = store.create_work_item(sample_item(&project.id, WorkItemKind::Story, None)).unwrap();
        let task = store.create_work_item(sample_item(&project.id, WorkItemKind::Task, Some(&story.id))).unwrap();

        store.delete_work_item(&story.id, false).unwrap();

        assert!(store.get_work_item(&story.id).is_err());
        assert!(store.get_work_item(&task.id).is_err());
    }

    #[test]
    fn token_ledger_sum_matches_session_usage() {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let session = store.create_session_record(&project.id, None).unwrap();

        store.record_token_usage(&session.id, "task-1", 100, 10, 5, 50).unwrap();
        store.record_token_usage(&session.id, "task-1", 20, 0, 0, 10).unwrap();

        let usage = store.get_session_token_usage(&session.id).unwrap();
        assert_eq!(usage, 160 + 30);
    }

    #[test]
    fn only_one_active_session_per_milestone() {
        let store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        store.create_session_record(&project.id, Some("milestone-1")).unwrap();
        assert!(store.create_session_record(&project.id, Some("milestone-1")).is_err());
    }

    #[test]
    fn refresh_session_creates_successor_with_same_milestone() {
        let mut store = Store::open_in_memory().unwrap();
        let project = store.create_project("P", "/tmp/p").unwrap();
        let session = store.create_session_record(&project.id, Some("milestone-1")).unwrap();

        let next = store.refresh_session(&session.id, "summary text").unwrap();
        assert_eq!(next.milestone_id.as_deref(), Some("milestone-1"));

        let old = store.get_session(&session.id).unwrap();
        assert_eq!(old.status, SessionStatus::Refreshed);
        assert_eq!(old.summary.as_deref(), Some("summary text"));

        let sessions = store.list_sessions_for_milestone("milestone-1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.iter().filter(|s| s.status == SessionStatus::Active).count(), 1);
    }

    #[test]
    fn unresolved_breakpoint_blocks_task_progress() {
        let store = Store::open_in_memory().unwrap();
        let bp = store.create_breakpoint("task-1", BreakpointReason::LowConfidence).unwrap();
        assert!(store.unresolved_breakpoint_for_task("task-1").unwrap().is_some());

        store.resolve_breakpoint(&bp.id, BreakpointResolution::Proceed).unwrap();
        assert!(store.unresolved_breakpoint_for_task("task-1").unwrap().is_none());
    }

    proptest! {
        /// No sequence of chained dependency links may introduce a cycle —
        /// `assert_acyclic` must reject linking the head of a chain back to
        /// its own tail regardless of chain length.
        #[test]
        fn chained_dependencies_never_admit_a_cycle(chain_len in 1usize..8) {
            let store = Store::open_in_memory().unwrap();
            let project = store.create_project("P", "/tmp/p").unwrap();

            let mut items = Vec::new();
            for i in 0..chain_len {
                let mut item = sample_item(&project.id, WorkItemKind::Task, None);
                if let Some(prev) = items.last() {
                    let prev_id: &String = prev;
                    item.dependencies = vec![prev_id.clone()];
                }
                let item = store.create_work_item(item).unwrap();
                items.push(item.id);
            }

            let head = items.first().unwrap().clone();
            let tail = items.last().unwrap().clone();

            let mut updates = HashMap::new();
            updates.insert("dependencies".to_string(), Value::Array(vec![Value::String(tail)]));
            prop_assert!(store.update_work_item(&head, &updates).is_err());
        }
    }
}
