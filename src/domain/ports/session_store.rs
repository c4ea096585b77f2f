//! Session Store port (C10): snapshot/restore of in-flight close-loop runs.

use async_trait::async_trait;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::CloseLoopSession;

/// Resolves a `--resume` reference to a concrete session.
#[derive(Debug, Clone)]
pub enum SessionResumeRef {
    Latest,
    Interrupted,
    Id(String),
    Path(std::path::PathBuf),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn persist(&self, session: &CloseLoopSession) -> OrchestratorResult<()>;

    async fn resolve(&self, reference: &SessionResumeRef) -> OrchestratorResult<Option<CloseLoopSession>>;

    /// Deletes sessions beyond `keep` (most-recent-first) AND older than
    /// `older_than_days`, never the currently active session.
    async fn prune(&self, keep: usize, older_than_days: u32, active_session_id: &str) -> OrchestratorResult<usize>;
}
