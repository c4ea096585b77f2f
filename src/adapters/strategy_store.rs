//! File-backed Strategy Memory (C9): single JSON document under the
//! workspace, rewritten atomically on every run.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::domain::errors::OrchestratorResult;
use crate::domain::error::SessionError;
use crate::domain::models::StrategyMemory;
use crate::domain::ports::StrategyStore;

pub struct FileStrategyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStrategyStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let path = workspace_root.into().join(".sce").join("auto").join("close-loop-strategy-memory.json");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl StrategyStore for FileStrategyStore {
    async fn load(&self) -> OrchestratorResult<StrategyMemory> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents).map_err(SessionError::from)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StrategyMemory::default()),
            Err(err) => Err(SessionError::ReadFailed {
                path: self.path.display().to_string(),
                source: err,
            }
            .into()),
        }
    }

    async fn save(&self, memory: &StrategyMemory) -> OrchestratorResult<()> {
        let _guard = self.write_lock.lock().await;
        let parent = self.path.parent().expect("strategy memory path always has a parent");
        tokio::fs::create_dir_all(parent).await.map_err(|source| SessionError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp_path = parent.join(format!(".close-loop-strategy-memory.json.{}.tmp", uuid::Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(memory).map_err(SessionError::from)?;
        tokio::fs::write(&tmp_path, &body).await.map_err(|source| SessionError::WriteFailed {
            path: tmp_path.display().to_string(),
            source,
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|source| SessionError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn load_without_file_returns_default() {
        let dir = tempdir().unwrap();
        let store = FileStrategyStore::new(dir.path().to_path_buf());
        let memory = store.load().await.unwrap();
        assert!(memory.goals.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileStrategyStore::new(dir.path().to_path_buf());
        let mut memory = StrategyMemory::default();
        memory.record_track("quality-gates", true);
        store.save(&memory).await.unwrap();
        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.tracks["quality-gates"].attempts, 1);
    }
}
