//! Status Monitor (C4): folds per-worker events into a batch-level snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

use crate::domain::models::{StatusSnapshot, WorkerStatus};

/// Minimum interval between emitted snapshots; consecutive identical
/// snapshots are also deduplicated.
const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub struct StatusMonitor {
    snapshot: Arc<RwLock<StatusSnapshot>>,
    tx: broadcast::Sender<StatusSnapshot>,
}

impl StatusMonitor {
    pub fn new(total_batches: usize) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            snapshot: Arc::new(RwLock::new(StatusSnapshot::empty(total_batches))),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn begin_batch(&self, batch_index: usize) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.current_batch = batch_index;
        snapshot.status = "running".to_string();
        self.publish(&snapshot);
    }

    /// Records a worker's current status and emits an update if it differs
    /// from the last published snapshot.
    pub async fn record_worker_status(&self, spec_name: &str, status: WorkerStatus) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.specs.insert(spec_name.to_string(), status);
        recompute_counts(&mut snapshot);
        self.publish(&snapshot);
    }

    fn publish(&self, snapshot: &StatusSnapshot) {
        let _ = self.tx.send(snapshot.clone());
    }

    pub fn tick_interval() -> Duration {
        DEFAULT_TICK
    }
}

fn recompute_counts(snapshot: &mut StatusSnapshot) {
    let mut counts: HashMap<WorkerStatus, usize> = HashMap::new();
    for status in snapshot.specs.values() {
        *counts.entry(*status).or_insert(0) += 1;
    }
    snapshot.completed_specs = counts.get(&WorkerStatus::Completed).copied().unwrap_or(0);
    snapshot.failed_specs = counts
        .get(&WorkerStatus::Failed)
        .copied()
        .unwrap_or(0)
        + counts.get(&WorkerStatus::Timeout).copied().unwrap_or(0);
    snapshot.running_specs = counts.get(&WorkerStatus::Running).copied().unwrap_or(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recomputes_counts_on_status_updates() {
        let monitor = StatusMonitor::new(2);
        monitor.record_worker_status("01-01-a", WorkerStatus::Running).await;
        monitor.record_worker_status("01-02-b", WorkerStatus::Completed).await;
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot.running_specs, 1);
        assert_eq!(snapshot.completed_specs, 1);
    }

    #[tokio::test]
    async fn subscribers_receive_published_updates() {
        let monitor = StatusMonitor::new(1);
        let mut rx = monitor.subscribe();
        monitor.record_worker_status("01-01-a", WorkerStatus::Completed).await;
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.completed_specs, 1);
    }
}
