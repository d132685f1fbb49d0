// Execution history: in-memory records of every run, with completed runs
// appended to a JSONL log. Records never carry environment values.

use crate::models::{ExecutionStatus, JobExecution};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Store of execution records for the lifetime of the daemon
pub struct HistoryStore {
    executions: RwLock<Vec<JobExecution>>,
    log_path: Option<PathBuf>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(Vec::new()),
            log_path: None,
        }
    }

    /// Append terminal records to a JSONL file under the data directory
    pub fn with_log_file(path: PathBuf) -> Self {
        Self {
            executions: RwLock::new(Vec::new()),
            log_path: Some(path),
        }
    }

    pub async fn create(&self, execution: &JobExecution) {
        self.executions.write().await.push(execution.clone());
    }

    /// Replace the stored record with the same id. Terminal records are
    /// also appended to the log file.
    pub async fn update(&self, execution: &JobExecution) {
        {
            let mut executions = self.executions.write().await;
            match executions.iter_mut().find(|e| e.id == execution.id) {
                Some(stored) => *stored = execution.clone(),
                None => executions.push(execution.clone()),
            }
        }

        if execution.status.is_terminal() {
            self.append_to_log(execution);
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<JobExecution> {
        self.executions
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub async fn find_by_idempotency_key(&self, key: &str) -> Option<JobExecution> {
        self.executions
            .read()
            .await
            .iter()
            .find(|e| e.idempotency_key == key)
            .cloned()
    }

    /// Most recent records first, optionally filtered by job name
    pub async fn list(&self, job_name: Option<&str>, limit: usize) -> Vec<JobExecution> {
        self.executions
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| job_name.is_none_or(|name| e.job_name == name))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Whether the job has a pending or running execution. The engine uses
    /// this to keep one run in flight per job.
    pub async fn has_active(&self, job_name: &str) -> bool {
        self.executions
            .read()
            .await
            .iter()
            .any(|e| e.job_name == job_name && !e.status.is_terminal())
    }

    /// Start time of the job's most recent run
    pub async fn last_started_at(&self, job_name: &str) -> Option<DateTime<Utc>> {
        self.executions
            .read()
            .await
            .iter()
            .filter(|e| e.job_name == job_name)
            .filter_map(|e| e.started_at)
            .max()
    }

    fn append_to_log(&self, execution: &JobExecution) {
        let Some(path) = &self.log_path else {
            return;
        };

        let line = match serde_json::to_string(execution) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize execution record");
                return;
            }
        };

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| {
                use std::io::Write;
                writeln!(file, "{}", line)
            });

        if let Err(e) = result {
            // A full disk must not fail the run itself
            warn!(error = %e, path = %path.display(), "Failed to append execution record");
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobExecution;

    #[tokio::test]
    async fn test_create_and_find() {
        let store = HistoryStore::new();
        let execution = JobExecution::new_manual("sync", "tester".to_string());
        store.create(&execution).await;

        let found = store.find_by_id(execution.id).await.unwrap();
        assert_eq!(found.job_name, "sync");
        assert_eq!(found.status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let store = HistoryStore::new();
        let mut execution = JobExecution::new_manual("sync", "tester".to_string());
        store.create(&execution).await;

        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        store.update(&execution).await;

        let found = store.find_by_id(execution.id).await.unwrap();
        assert_eq!(found.status, ExecutionStatus::Running);
        assert_eq!(store.list(None, 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_has_active_tracks_terminal_transitions() {
        let store = HistoryStore::new();
        let mut execution = JobExecution::new_manual("sync", "tester".to_string());
        store.create(&execution).await;
        assert!(store.has_active("sync").await);
        assert!(!store.has_active("other").await);

        execution.status = ExecutionStatus::Success;
        store.update(&execution).await;
        assert!(!store.has_active("sync").await);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let store = HistoryStore::new();
        let first = JobExecution::new_manual("a", "t".to_string());
        let second = JobExecution::new_manual("b", "t".to_string());
        let third = JobExecution::new_manual("a", "t".to_string());
        store.create(&first).await;
        store.create(&second).await;
        store.create(&third).await;

        let all = store.list(None, 10).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, third.id);

        let only_a = store.list(Some("a"), 10).await;
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|e| e.job_name == "a"));

        assert_eq!(store.list(None, 2).await.len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_records_append_to_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executions.jsonl");
        let store = HistoryStore::with_log_file(path.clone());

        let mut execution = JobExecution::new_manual("sync", "tester".to_string());
        store.create(&execution).await;
        // Non-terminal update writes nothing
        execution.status = ExecutionStatus::Running;
        store.update(&execution).await;
        assert!(!path.exists());

        execution.status = ExecutionStatus::Failed;
        execution.error = Some("step 'run' exited with code 3".to_string());
        store.update(&execution).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: JobExecution = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.id, execution.id);
        assert_eq!(parsed.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_last_started_at() {
        let store = HistoryStore::new();
        assert!(store.last_started_at("sync").await.is_none());

        let mut execution = JobExecution::new_manual("sync", "t".to_string());
        let started = Utc::now();
        execution.started_at = Some(started);
        store.create(&execution).await;

        assert_eq!(store.last_started_at("sync").await, Some(started));
    }
}
