//! Strategy Memory port (C9): single JSON document, rewritten atomically per run.

use async_trait::async_trait;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::StrategyMemory;

#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn load(&self) -> OrchestratorResult<StrategyMemory>;

    async fn save(&self, memory: &StrategyMemory) -> OrchestratorResult<()>;
}
