//! File-backed Session Store (C10): one snapshot per session under
//! `<ws>/.sce/auto/close-loop-sessions/<sessionId>.json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::Mutex;

use crate::domain::error::SessionError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{CloseLoopSession, SessionStatus};
use crate::domain::ports::{SessionResumeRef, SessionStore};

pub struct FileSessionStore {
    sessions_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let sessions_dir = workspace_root.into().join(".sce").join("auto").join("close-loop-sessions");
        Self {
            sessions_dir,
            write_lock: Mutex::new(()),
        }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    async fn read_session(path: &Path) -> OrchestratorResult<CloseLoopSession> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|source| SessionError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&contents).map_err(SessionError::from)?)
    }

    async fn list_session_files(&self) -> OrchestratorResult<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.sessions_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionError::ReadFailed {
                    path: self.sessions_dir.display().to_string(),
                    source,
                }
                .into())
            }
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| SessionError::ReadFailed {
            path: self.sessions_dir.display().to_string(),
            source,
        })? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn modified(path: &Path) -> Option<SystemTime> {
        tokio::fs::metadata(path).await.ok()?.modified().ok()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn persist(&self, session: &CloseLoopSession) -> OrchestratorResult<()> {
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.sessions_dir).await.map_err(|source| SessionError::WriteFailed {
            path: self.sessions_dir.display().to_string(),
            source,
        })?;
        let path = self.session_path(&session.session_id);
        let tmp_path = self.sessions_dir.join(format!(".{}.json.{}.tmp", session.session_id, uuid::Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(session).map_err(SessionError::from)?;
        tokio::fs::write(&tmp_path, &body).await.map_err(|source| SessionError::WriteFailed {
            path: tmp_path.display().to_string(),
            source,
        })?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|source| SessionError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    async fn resolve(&self, reference: &SessionResumeRef) -> OrchestratorResult<Option<CloseLoopSession>> {
        match reference {
            SessionResumeRef::Path(path) => {
                if tokio::fs::try_exists(path).await.unwrap_or(false) {
                    Ok(Some(Self::read_session(path).await?))
                } else {
                    Ok(None)
                }
            }
            SessionResumeRef::Id(id) => {
                let path = self.session_path(id);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    Ok(Some(Self::read_session(&path).await?))
                } else {
                    Ok(None)
                }
            }
            SessionResumeRef::Latest => {
                let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
                for path in self.list_session_files().await? {
                    if let Some(mtime) = Self::modified(&path).await {
                        candidates.push((mtime, path));
                    }
                }
                candidates.sort_by_key(|(mtime, _)| *mtime);
                match candidates.pop() {
                    Some((_, path)) => Ok(Some(Self::read_session(&path).await?)),
                    None => Ok(None),
                }
            }
            SessionResumeRef::Interrupted => {
                let mut candidates: Vec<(SystemTime, CloseLoopSession)> = Vec::new();
                for path in self.list_session_files().await? {
                    let Some(mtime) = Self::modified(&path).await else { continue };
                    if let Ok(session) = Self::read_session(&path).await {
                        if session.status != SessionStatus::Completed {
                            candidates.push((mtime, session));
                        }
                    }
                }
                candidates.sort_by_key(|(mtime, _)| *mtime);
                Ok(candidates.pop().map(|(_, session)| session))
            }
        }
    }

    async fn prune(&self, keep: usize, older_than_days: u32, active_session_id: &str) -> OrchestratorResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut candidates: Vec<(SystemTime, PathBuf, String)> = Vec::new();
        for path in self.list_session_files().await? {
            let Some(mtime) = Self::modified(&path).await else { continue };
            let session_id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            if session_id == active_session_id {
                continue;
            }
            candidates.push((mtime, path, session_id));
        }
        // Most-recent-first.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let cutoff = SystemTime::now()
            .checked_sub(std::time::Duration::from_secs(u64::from(older_than_days) * 86_400))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut pruned = 0;
        for (index, (mtime, path, _)) in candidates.iter().enumerate() {
            if index < keep {
                continue;
            }
            if *mtime > cutoff {
                continue;
            }
            if tokio::fs::remove_file(path).await.is_ok() {
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Portfolio, ReplanConfig, ReplanState, Spec, SpecRole};
    use chrono::Utc;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn sample_session(id: &str, status: SessionStatus) -> CloseLoopSession {
        let master = Spec::new(format!("{id}-00-goal"), SpecRole::Master, HashSet::new());
        CloseLoopSession {
            schema_version: CloseLoopSession::SCHEMA_VERSION,
            session_id: id.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            goal: "goal".to_string(),
            status,
            portfolio: Portfolio {
                goal: "goal".to_string(),
                prefix: 1,
                master_spec: master,
                sub_specs: Vec::new(),
                tracks: Vec::new(),
            },
            replan_config: ReplanConfig::default(),
            replan: ReplanState::default(),
            dod: None,
            orchestration: None,
        }
    }

    #[tokio::test]
    async fn persist_then_resolve_by_id() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        let session = sample_session("01-20260101T000000Z", SessionStatus::Running);
        store.persist(&session).await.unwrap();
        let resolved = store
            .resolve(&SessionResumeRef::Id("01-20260101T000000Z".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.session_id, session.session_id);
    }

    #[tokio::test]
    async fn resolve_latest_picks_newest_mtime() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        store.persist(&sample_session("01-a", SessionStatus::Completed)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        store.persist(&sample_session("01-b", SessionStatus::Running)).await.unwrap();
        let resolved = store.resolve(&SessionResumeRef::Latest).await.unwrap().unwrap();
        assert_eq!(resolved.session_id, "01-b");
    }

    #[tokio::test]
    async fn resolve_interrupted_skips_completed_sessions() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        store.persist(&sample_session("01-a", SessionStatus::Completed)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        store.persist(&sample_session("01-b", SessionStatus::Running)).await.unwrap();
        let resolved = store.resolve(&SessionResumeRef::Interrupted).await.unwrap().unwrap();
        assert_eq!(resolved.session_id, "01-b");
    }

    #[tokio::test]
    async fn prune_never_removes_active_session() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf());
        store.persist(&sample_session("01-a", SessionStatus::Completed)).await.unwrap();
        store.persist(&sample_session("01-b", SessionStatus::Completed)).await.unwrap();
        let pruned = store.prune(0, 0, "01-a").await.unwrap();
        assert_eq!(pruned, 1);
        assert!(store.resolve(&SessionResumeRef::Id("01-a".to_string())).await.unwrap().is_some());
    }
}
