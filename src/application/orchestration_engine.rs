//! Orchestration Engine (C7): DAG topological batching, parallel worker
//! dispatch, terminal-state resolution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::application::status_monitor::StatusMonitor;
use crate::domain::error::OrchestrationError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{OrchestrationResult, OrchestrationStatus, Spec, SpecDag, SpecStatus, WorkerStatus};
use crate::domain::ports::{AgentSpawner, CollaborationStore};

pub struct RunOptions {
    pub max_parallel: usize,
}

pub struct OrchestrationEngine {
    store: Arc<dyn CollaborationStore>,
    spawner: Arc<dyn AgentSpawner>,
}

impl OrchestrationEngine {
    pub fn new(store: Arc<dyn CollaborationStore>, spawner: Arc<dyn AgentSpawner>) -> Self {
        Self { store, spawner }
    }

    pub async fn run(
        &self,
        specs: &[Spec],
        options: RunOptions,
        monitor: &StatusMonitor,
        cancel: CancellationToken,
    ) -> OrchestratorResult<OrchestrationResult> {
        let started = Instant::now();
        let input: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();

        let dag = SpecDag::from_specs(specs);
        if dag.has_cycle() {
            return Err(OrchestrationError::CycleDetected.into());
        }
        let waves = dag
            .execution_waves()
            .map_err(|_| OrchestrationError::CycleDetected)?;

        tracing::info!(total_specs = input.len(), total_batches = waves.len(), "orchestration plan computed");

        let lease_semaphores = build_lease_semaphores(specs);
        let max_parallel = options.max_parallel.max(1);
        let semaphore = Arc::new(Semaphore::new(max_parallel));

        let mut completed: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut skipped: HashSet<String> = HashSet::new();

        'batches: for (batch_index, batch) in waves.iter().enumerate() {
            if cancel.is_cancelled() {
                break 'batches;
            }

            monitor.begin_batch(batch_index + 1).await;

            let runnable: Vec<&String> = batch.iter().filter(|name| !skipped.contains(*name)).collect();

            for name in &runnable {
                self.store.update_status(name, SpecStatus::InProgress, None).await?;
            }

            let mut handles = Vec::new();
            for name in runnable {
                let spec_name = name.clone();
                let spawner = Arc::clone(&self.spawner);
                let permit_semaphore = Arc::clone(&semaphore);
                let lease_mutex = spec_lease_mutex(&lease_semaphores, specs, &spec_name);
                let cancel = cancel.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = permit_semaphore.acquire_owned().await.ok();
                    let _lease_guard = match lease_mutex {
                        Some(mutex) => Some(mutex.lock_owned().await),
                        None => None,
                    };
                    if cancel.is_cancelled() {
                        return (spec_name, None);
                    }
                    let result = spawner.spawn(&spec_name).await;
                    (spec_name, Some(result))
                }));
            }

            for handle in handles {
                let (spec_name, outcome) = handle.await.map_err(|e| OrchestrationError::StoreError(e.to_string()))?;
                match outcome {
                    None => {
                        // cancelled before spawn; leave status as in-progress, loop below handles `stopped`.
                    }
                    Some(Ok(worker)) => {
                        let worker_status = worker.status;
                        monitor.record_worker_status(&spec_name, worker_status).await;
                        if worker_status == WorkerStatus::Completed {
                            completed.insert(spec_name.clone());
                            self.store.update_status(&spec_name, SpecStatus::Completed, None).await?;
                        } else {
                            failed.insert(spec_name.clone());
                            self.store
                                .update_status(&spec_name, SpecStatus::Blocked, Some("orchestration-failed"))
                                .await?;
                            self.propagate_skip(&dag, &spec_name, &mut skipped, "dependency-skipped").await?;
                        }
                    }
                    Some(Err(err)) => {
                        failed.insert(spec_name.clone());
                        self.store
                            .update_status(&spec_name, SpecStatus::Blocked, Some("orchestration-failed"))
                            .await?;
                        self.propagate_skip(&dag, &spec_name, &mut skipped, "dependency-skipped").await?;
                        tracing::warn!(spec_name, error = %err, "worker spawn failed");
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            self.spawner.kill_all().await?;
            return Ok(OrchestrationResult {
                status: OrchestrationStatus::Stopped,
                completed: completed.into_iter().collect(),
                failed: failed.into_iter().collect(),
                skipped: skipped.into_iter().collect(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        let status = if failed.is_empty() && skipped.is_empty() {
            OrchestrationStatus::Completed
        } else if completed.is_empty() {
            OrchestrationStatus::Failed
        } else {
            OrchestrationStatus::PartialFailed
        };

        let mut completed: Vec<String> = completed.into_iter().collect();
        let mut failed: Vec<String> = failed.into_iter().collect();
        let mut skipped: Vec<String> = skipped.into_iter().collect();
        completed.sort();
        failed.sort();
        skipped.sort();

        tracing::info!(?status, completed = completed.len(), failed = failed.len(), skipped = skipped.len(), "orchestration run finished");

        Ok(OrchestrationResult {
            status,
            completed,
            failed,
            skipped,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Marks every descendant of a failed spec `skipped` without spawning it.
    async fn propagate_skip(
        &self,
        dag: &SpecDag,
        failed_spec: &str,
        skipped: &mut HashSet<String>,
        reason: &str,
    ) -> OrchestratorResult<()> {
        for dependent in dag.get_all_dependents(failed_spec) {
            if skipped.insert(dependent.clone()) {
                self.store.update_status(&dependent, SpecStatus::Blocked, Some(reason)).await?;
            }
        }
        Ok(())
    }
}

/// Specs sharing a lease key form a conflict group; only one worker per group
/// may run at a time regardless of `maxParallel`.
fn build_lease_semaphores(specs: &[Spec]) -> HashMap<String, Arc<Mutex<()>>> {
    let mut groups: HashMap<String, usize> = HashMap::new();
    for spec in specs {
        *groups.entry(spec.lease_key.clone()).or_insert(0) += 1;
    }
    groups
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| (key, Arc::new(Mutex::new(()))))
        .collect()
}

fn spec_lease_mutex(
    lease_semaphores: &HashMap<String, Arc<Mutex<()>>>,
    specs: &[Spec],
    spec_name: &str,
) -> Option<Arc<Mutex<()>>> {
    let lease_key = specs.iter().find(|s| s.name == spec_name)?.lease_key.clone();
    lease_semaphores.get(&lease_key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SpecRole;
    use std::collections::HashSet as Set;

    #[test]
    fn lease_conflict_groups_only_formed_for_shared_keys() {
        let specs = vec![
            Spec::new("01-01-quality-gates-a", SpecRole::Sub, Set::new()),
            Spec::new("01-02-quality-gates-b", SpecRole::Sub, Set::new()),
            Spec::new("01-03-docs-rollout", SpecRole::Sub, Set::new()),
        ];
        let semaphores = build_lease_semaphores(&specs);
        assert_eq!(semaphores.len(), 1);
        assert!(semaphores.contains_key("quality-gates"));
    }
}
