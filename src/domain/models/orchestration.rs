//! Orchestration run results and live status snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::spec::SpecStatus;
use super::worker::WorkerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrchestrationStatus {
    Completed,
    PartialFailed,
    Failed,
    Stopped,
    Prepared,
}

/// Result of one orchestration run. `completed`, `failed`, and `skipped`
/// partition the input spec set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub status: OrchestrationStatus,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub duration_ms: u64,
}

impl OrchestrationResult {
    /// Sanity-checks the partition invariant; used by tests and defensive asserts at call sites.
    pub fn partitions(&self, input: &[String]) -> bool {
        let mut seen: Vec<&String> = self
            .completed
            .iter()
            .chain(self.failed.iter())
            .chain(self.skipped.iter())
            .collect();
        seen.sort();
        let mut wanted: Vec<&String> = input.iter().collect();
        wanted.sort();
        seen == wanted
    }
}

/// Snapshot of a worker within a `StatusSnapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecStatusEntry {
    pub status: SpecStatus,
}

/// Aggregate batch-level view folded from per-worker events, emitted at most
/// once per tick and deduplicated when unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub status: String,
    pub current_batch: usize,
    pub total_batches: usize,
    pub completed_specs: usize,
    pub failed_specs: usize,
    pub running_specs: usize,
    pub specs: HashMap<String, WorkerStatus>,
}

impl StatusSnapshot {
    pub fn empty(total_batches: usize) -> Self {
        Self {
            status: "pending".to_string(),
            current_batch: 0,
            total_batches,
            completed_specs: 0,
            failed_specs: 0,
            running_specs: 0,
            specs: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_detects_overlap() {
        let result = OrchestrationResult {
            status: OrchestrationStatus::Completed,
            completed: vec!["a".into()],
            failed: vec![],
            skipped: vec![],
            duration_ms: 10,
        };
        assert!(result.partitions(&["a".to_string()]));
        assert!(!result.partitions(&["a".to_string(), "b".to_string()]));
    }
}
