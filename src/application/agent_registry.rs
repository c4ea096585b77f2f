//! Agent Registry (C2): process-wide mapping of live worker IDs to metadata.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AgentMetadata {
    pub worker_id: Uuid,
    pub spec_name: String,
    pub registered_at: DateTime<Utc>,
}

/// Constant-time register/deregister bookkeeping for observability and leak
/// detection; never consulted for scheduling decisions.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    workers: Arc<RwLock<HashMap<Uuid, AgentMetadata>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, spec_name: &str) -> Uuid {
        let worker_id = Uuid::new_v4();
        let metadata = AgentMetadata {
            worker_id,
            spec_name: spec_name.to_string(),
            registered_at: Utc::now(),
        };
        self.workers.write().await.insert(worker_id, metadata);
        tracing::info!(%worker_id, spec_name, "worker registered");
        worker_id
    }

    /// Idempotent; logs but never propagates a missing entry.
    pub async fn deregister(&self, worker_id: Uuid) {
        let removed = self.workers.write().await.remove(&worker_id);
        match removed {
            Some(meta) => tracing::info!(%worker_id, spec_name = %meta.spec_name, "worker deregistered"),
            None => tracing::debug!(%worker_id, "deregister called for unknown worker"),
        }
    }

    pub async fn is_registered(&self, worker_id: Uuid) -> bool {
        self.workers.read().await.contains_key(&worker_id)
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_deregister_removes_entry() {
        let registry = AgentRegistry::new();
        let id = registry.register("01-01-track").await;
        assert!(registry.is_registered(id).await);
        registry.deregister(id).await;
        assert!(!registry.is_registered(id).await);
    }

    #[tokio::test]
    async fn deregister_unknown_worker_is_a_no_op() {
        let registry = AgentRegistry::new();
        registry.deregister(Uuid::new_v4()).await;
        assert!(registry.is_empty().await);
    }
}
