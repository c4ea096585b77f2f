//! Agent Spawner port (C3): launch, supervise, and terminate worker sub-processes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::SpawnedWorker;

/// Cross-platform sub-process supervisor contract. Implemented by
/// `adapters::substrates::codex_cli::CodexCliSpawner`.
///
/// `spawn` runs the worker to its terminal state and returns the final
/// bookkeeping snapshot; `kill`/`kill_all` act on workers still in flight in
/// other concurrently-awaited `spawn` calls, mirroring the teacher's
/// `Substrate::execute` / `terminate` split.
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    /// Launches one worker for `spec_name` and awaits its terminal state
    /// (`completed` | `failed` | `timeout`).
    async fn spawn(&self, spec_name: &str) -> OrchestratorResult<SpawnedWorker>;

    /// Graceful-terminate escalating to force-kill; idempotent.
    async fn kill(&self, worker_id: Uuid) -> OrchestratorResult<()>;

    /// Applies `kill` to every worker currently `running`.
    async fn kill_all(&self) -> OrchestratorResult<()>;

    /// Scans a worker's captured events for the worker-result-summary contract
    /// `None` if nothing matches.
    fn get_result_summary(&self, worker: &SpawnedWorker) -> Option<serde_json::Value>;
}
