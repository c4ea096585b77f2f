//! Collaboration Store port (C5): persistent per-spec metadata.

use async_trait::async_trait;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{Spec, SpecStatus};

/// Per-spec metadata store. Writes must be serialized per spec (write-then-rename
/// or equivalent atomic replace); readers may observe pre- or post-update state,
/// never a partial one.
#[async_trait]
pub trait CollaborationStore: Send + Sync {
    async fn read_metadata(&self, spec_name: &str) -> OrchestratorResult<Option<Spec>>;

    async fn write_metadata(&self, spec: &Spec) -> OrchestratorResult<()>;

    async fn update_status(
        &self,
        spec_name: &str,
        status: SpecStatus,
        reason: Option<&str>,
    ) -> OrchestratorResult<()>;

    async fn assign_spec(&self, spec_name: &str, agent_logical_id: &str) -> OrchestratorResult<()>;
}
