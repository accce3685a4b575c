//! Event logger: persists events to per-task JSONL files under
//! `~/.orch/runs/{task-id}/events.jsonl` for history, debugging, and replay.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, OrchEvent};

pub struct EventLogger {
    runs_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(runs_dir: impl AsRef<Path>) -> Self {
        Self { runs_dir: runs_dir.as_ref().to_path_buf(), writers: HashMap::new() }
    }

    pub fn with_default_path() -> eyre::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| eyre::eyre!("could not determine home directory"))?;
        let runs_dir = home.join(".orch").join("runs");
        fs::create_dir_all(&runs_dir)?;
        Ok(Self::new(runs_dir))
    }

    pub fn write_event(&mut self, event: &OrchEvent) -> eyre::Result<()> {
        let task_id = event.task_id();
        let writer = if let Some(w) = self.writers.get_mut(task_id) {
            w
        } else {
            let task_dir = self.runs_dir.join(task_id);
            fs::create_dir_all(&task_dir)?;
            let log_path = task_dir.join("events.jsonl");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(task_id.to_string(), BufWriter::new(file));
            self.writers.get_mut(task_id).unwrap()
        };

        let entry = EventLogEntry::new(event.clone());
        writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn close_task(&mut self, task_id: &str) {
        if let Some(mut writer) = self.writers.remove(task_id) {
            let _ = writer.flush();
        }
    }

    pub async fn run(mut self, event_bus: Arc<EventBus>) {
        let mut rx = event_bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let task_id = event.task_id().to_string();
                    let terminal = event.is_terminal();
                    if let Err(e) = self.write_event(&event) {
                        error!(%task_id, error = %e, "EventLogger: failed to write event");
                    }
                    if terminal {
                        self.close_task(&task_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        for (_, mut writer) in self.writers.drain() {
            let _ = writer.flush();
        }
    }
}

pub fn read_task_events(runs_dir: impl AsRef<Path>, task_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = runs_dir.as_ref().join(task_id).join("events.jsonl");
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line, error = %e, "read_task_events: failed to parse line"),
        }
    }
    Ok(entries)
}

pub fn spawn_event_logger(event_bus: Arc<EventBus>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::with_default_path()?;
    Ok(tokio::spawn(async move {
        logger.run(event_bus).await;
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn prompt_sent(task_id: &str) -> OrchEvent {
        OrchEvent::PromptSent { task_id: task_id.to_string(), session_id: "s1".to_string(), iteration: 1, max_turns: 6 }
    }

    #[test]
    fn writes_event_to_its_task_directory() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.write_event(&prompt_sent("task-123")).unwrap();

        let log_path = temp.path().join("task-123").join("events.jsonl");
        assert!(log_path.exists());
        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("PromptSent"));
    }

    #[test]
    fn tasks_get_separate_files() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.write_event(&prompt_sent("task-a")).unwrap();
        logger.write_event(&prompt_sent("task-b")).unwrap();
        assert!(temp.path().join("task-a").join("events.jsonl").exists());
        assert!(temp.path().join("task-b").join("events.jsonl").exists());
    }

    #[test]
    fn read_preserves_order() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.write_event(&prompt_sent("task-x")).unwrap();
        logger.write_event(&OrchEvent::Resumed { task_id: "task-x".to_string() }).unwrap();

        let entries = read_task_events(temp.path(), "task-x").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "PromptSent");
        assert_eq!(entries[1].event.event_type(), "Resumed");
    }

    #[test]
    fn read_nonexistent_task_is_empty() {
        let temp = tempdir().unwrap();
        assert!(read_task_events(temp.path(), "nope").unwrap().is_empty());
    }

    #[test]
    fn close_then_reopen_appends() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.write_event(&prompt_sent("task-y")).unwrap();
        logger.close_task("task-y");
        logger.write_event(&OrchEvent::Resumed { task_id: "task-y".to_string() }).unwrap();

        let entries = read_task_events(temp.path(), "task-y").unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn close_nonexistent_task_does_not_panic() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.close_task("never-existed");
    }
}
