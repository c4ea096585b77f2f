//! File-backed Collaboration Store (C5): one `collaboration.json` per spec
//! under `<ws>/.sce/specs/<specName>/`, written atomically.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::error::OrchestrationError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{Spec, SpecStatus};
use crate::domain::ports::CollaborationStore;

/// Serializes writes per spec name; readers never block on it.
pub struct FileCollaborationStore {
    workspace_root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileCollaborationStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn metadata_path(&self, spec_name: &str) -> PathBuf {
        self.workspace_root
            .join(".sce")
            .join("specs")
            .join(spec_name)
            .join("collaboration.json")
    }

    async fn lock_for(&self, spec_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(spec_name.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn read(path: &Path) -> OrchestratorResult<Option<Spec>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let spec: Spec = serde_json::from_str(&contents)
                    .map_err(|e| OrchestrationError::StoreError(e.to_string()))?;
                Ok(Some(spec))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(OrchestrationError::StoreError(err.to_string()).into()),
        }
    }

    async fn write_atomic(path: &Path, spec: &Spec) -> OrchestratorResult<()> {
        let parent = path.parent().expect("metadata path always has a parent");
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| OrchestrationError::StoreError(e.to_string()))?;
        let tmp_path = parent.join(format!(".collaboration.json.{}.tmp", uuid::Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(spec).map_err(|e| OrchestrationError::StoreError(e.to_string()))?;
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|e| OrchestrationError::StoreError(e.to_string()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| OrchestrationError::StoreError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CollaborationStore for FileCollaborationStore {
    async fn read_metadata(&self, spec_name: &str) -> OrchestratorResult<Option<Spec>> {
        Self::read(&self.metadata_path(spec_name)).await
    }

    async fn write_metadata(&self, spec: &Spec) -> OrchestratorResult<()> {
        let lock = self.lock_for(&spec.name).await;
        let _guard = lock.lock().await;
        Self::write_atomic(&self.metadata_path(&spec.name), spec).await
    }

    async fn update_status(
        &self,
        spec_name: &str,
        status: SpecStatus,
        reason: Option<&str>,
    ) -> OrchestratorResult<()> {
        let lock = self.lock_for(spec_name).await;
        let _guard = lock.lock().await;
        let path = self.metadata_path(spec_name);
        let Some(mut spec) = Self::read(&path).await? else {
            return Err(OrchestrationError::UnknownSpec(spec_name.to_string()).into());
        };
        spec.status = status;
        tracing::debug!(spec_name, ?status, reason, "spec status updated");
        Self::write_atomic(&path, &spec).await
    }

    async fn assign_spec(&self, spec_name: &str, agent_logical_id: &str) -> OrchestratorResult<()> {
        let lock = self.lock_for(spec_name).await;
        let _guard = lock.lock().await;
        let path = self.metadata_path(spec_name);
        let Some(mut spec) = Self::read(&path).await? else {
            return Err(OrchestrationError::UnknownSpec(spec_name.to_string()).into());
        };
        spec.assigned_agent_logical_id = Some(agent_logical_id.to_string());
        Self::write_atomic(&path, &spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SpecRole;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileCollaborationStore::new(dir.path().to_path_buf());
        let spec = Spec::new("01-01-track", SpecRole::Sub, HashSet::new());
        store.write_metadata(&spec).await.unwrap();
        let read = store.read_metadata("01-01-track").await.unwrap().unwrap();
        assert_eq!(read.name, "01-01-track");
        assert_eq!(read.status, SpecStatus::NotStarted);
    }

    #[tokio::test]
    async fn read_missing_spec_returns_none() {
        let dir = tempdir().unwrap();
        let store = FileCollaborationStore::new(dir.path().to_path_buf());
        assert!(store.read_metadata("01-99-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_persists_new_status() {
        let dir = tempdir().unwrap();
        let store = FileCollaborationStore::new(dir.path().to_path_buf());
        let spec = Spec::new("01-01-track", SpecRole::Sub, HashSet::new());
        store.write_metadata(&spec).await.unwrap();
        store.update_status("01-01-track", SpecStatus::Completed, None).await.unwrap();
        let read = store.read_metadata("01-01-track").await.unwrap().unwrap();
        assert_eq!(read.status, SpecStatus::Completed);
    }

    #[tokio::test]
    async fn update_status_on_unknown_spec_errors() {
        let dir = tempdir().unwrap();
        let store = FileCollaborationStore::new(dir.path().to_path_buf());
        let err = store.update_status("01-99-missing", SpecStatus::Completed, None).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn assign_spec_sets_agent_logical_id() {
        let dir = tempdir().unwrap();
        let store = FileCollaborationStore::new(dir.path().to_path_buf());
        let spec = Spec::new("01-01-track", SpecRole::Sub, HashSet::new());
        store.write_metadata(&spec).await.unwrap();
        store.assign_spec("01-01-track", "agent-42").await.unwrap();
        let read = store.read_metadata("01-01-track").await.unwrap().unwrap();
        assert_eq!(read.assigned_agent_logical_id.as_deref(), Some("agent-42"));
    }
}
