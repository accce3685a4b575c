//! Numbered, invertible migrations. Each entry's `up` runs once when the
//! database's `PRAGMA user_version` is below its index; `down` is provided so
//! an operator can step a schema backward (not currently wired to a CLI verb,
//! since no migration has needed reverting yet).

pub struct Migration {
    pub up: &'static str,
    pub down: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    up: "
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            working_directory TEXT NOT NULL,
            status TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS work_items (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            priority INTEGER NOT NULL DEFAULT 5,
            status TEXT NOT NULL,
            parent_id TEXT,
            dependencies TEXT NOT NULL DEFAULT '[]',
            required_epics TEXT NOT NULL DEFAULT '[]',
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_work_items_project ON work_items(project_id, kind, is_deleted);
        CREATE INDEX IF NOT EXISTS idx_work_items_parent ON work_items(parent_id);

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            milestone_id TEXT,
            started_at INTEGER NOT NULL,
            ended_at INTEGER,
            status TEXT NOT NULL,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            total_turns INTEGER NOT NULL DEFAULT 0,
            summary TEXT,
            last_heartbeat_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_milestone ON sessions(milestone_id, status);

        CREATE TABLE IF NOT EXISTS token_ledger (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            task_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            input_tokens INTEGER NOT NULL,
            cache_creation_tokens INTEGER NOT NULL,
            cache_read_tokens INTEGER NOT NULL,
            output_tokens INTEGER NOT NULL,
            total_tokens INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_token_ledger_session ON token_ledger(session_id);

        CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            task_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            iteration INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            response TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_interactions_task ON interactions(task_id, iteration);

        CREATE TABLE IF NOT EXISTS breakpoints (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            triggered_at INTEGER NOT NULL,
            resolved_at INTEGER,
            resolution TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_breakpoints_task ON breakpoints(task_id);

        CREATE TABLE IF NOT EXISTS checkpoints (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            trigger_code TEXT NOT NULL,
            artifact_ref TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checkpoints_session ON checkpoints(session_id);
    ",
    down: "
        DROP TABLE IF EXISTS checkpoints;
        DROP TABLE IF EXISTS breakpoints;
        DROP TABLE IF EXISTS interactions;
        DROP TABLE IF EXISTS token_ledger;
        DROP TABLE IF EXISTS sessions;
        DROP TABLE IF EXISTS work_items;
        DROP TABLE IF EXISTS projects;
    ",
}];
