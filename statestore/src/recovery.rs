//! Crash-safety recovery sweep, run once at `StateManager::spawn`. An
//! orphaned ACTIVE session left behind by a crash is never silently
//! resumed; the sweep surfaces it in a report and opens an
//! `EXPLICIT_REQUEST` breakpoint so an operator decides.

use crate::domain::{BreakpointReason, Session};
use crate::error::Result;
use crate::store::Store;

/// A session left ACTIVE longer than this with no heartbeat is presumed
/// orphaned by a crashed orchestrator task.
const STALE_HEARTBEAT_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub orphaned_sessions: Vec<Session>,
}

pub fn sweep_for_orphaned_sessions(store: &mut Store) -> Result<RecoveryReport> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut report = RecoveryReport::default();

    for session in store.list_active_sessions()? {
        if now - session.last_heartbeat_at > STALE_HEARTBEAT_MS {
            // A breakpoint is keyed by task_id in the schema; sessions have no
            // single owning task, so the session id itself is the key —
            // callers inspecting the breakpoint list for this pseudo-task see
            // it alongside real task breakpoints in the same table.
            store.create_breakpoint(&session.id, BreakpointReason::ExplicitRequest)?;
            report.orphaned_sessions.push(session);
        }
    }

    Ok(report)
}
