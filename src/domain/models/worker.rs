//! Spawned worker bookkeeping types, owned exclusively by the agent spawner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

impl WorkerStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One parsed JSONL record emitted by a worker on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEvent {
    pub worker_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// One running (or finished) sub-agent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnedWorker {
    pub worker_id: Uuid,
    pub spec_name: String,
    pub status: WorkerStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub events: Vec<serde_json::Value>,
    /// Tail-truncated accumulation of stderr bytes.
    pub stderr_buffer: String,
    pub prompt_tmp_file: Option<PathBuf>,
}

impl SpawnedWorker {
    pub fn new(spec_name: impl Into<String>, prompt_tmp_file: Option<PathBuf>) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            spec_name: spec_name.into(),
            status: WorkerStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            exit_code: None,
            events: Vec::new(),
            stderr_buffer: String::new(),
            prompt_tmp_file,
        }
    }

    /// The optional result-summary contract fields a worker may report.
    pub const SUMMARY_FIELDS: &'static [&'static str] = &[
        "spec_id",
        "changed_files",
        "tests_run",
        "tests_passed",
        "risk_level",
        "open_issues",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_worker_starts_running() {
        let worker = SpawnedWorker::new("01-01-track", None);
        assert_eq!(worker.status, WorkerStatus::Running);
        assert!(worker.completed_at.is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!WorkerStatus::Running.is_terminal());
        assert!(WorkerStatus::Completed.is_terminal());
        assert!(WorkerStatus::Failed.is_terminal());
        assert!(WorkerStatus::Timeout.is_terminal());
    }
}
