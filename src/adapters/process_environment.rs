//! Real `ProcessEnvironment` adapter: live env vars, the `~/.codex/auth.json`
//! credential file, and `PATH` probing for the worker binary.
//! "process-global state").

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::domain::ports::ProcessEnvironment;

/// Fields recognized in the credential file, in lookup order.
const CREDENTIAL_FIELDS: &[&str] = &["OPENAI_API_KEY", "CODEX_API_KEY"];

pub struct OsProcessEnvironment {
    workspace_root: PathBuf,
}

impl OsProcessEnvironment {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }

    fn credential_file_path() -> Option<PathBuf> {
        dirs_home().map(|home| home.join(".codex").join("auth.json"))
    }
}

#[async_trait]
impl ProcessEnvironment for OsProcessEnvironment {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    async fn read_credential_file(&self) -> Option<String> {
        let path = Self::credential_file_path()?;
        let contents = tokio::fs::read_to_string(&path).await.ok()?;
        let json: serde_json::Value = serde_json::from_str(&contents).ok()?;
        CREDENTIAL_FIELDS
            .iter()
            .find_map(|field| json.get(field).and_then(|v| v.as_str()).map(str::to_string))
    }

    async fn probe_command(&self, name: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                return Some(candidate);
            }
            #[cfg(windows)]
            {
                let candidate_exe = dir.join(format!("{name}.exe"));
                if tokio::fs::metadata(&candidate_exe).await.is_ok_and(|m| m.is_file()) {
                    return Some(candidate_exe);
                }
                let candidate_cmd = dir.join(format!("{name}.cmd"));
                if tokio::fs::metadata(&candidate_cmd).await.is_ok_and(|m| m.is_file()) {
                    return Some(candidate_cmd);
                }
            }
        }
        None
    }

    fn temp_dir(&self) -> PathBuf {
        self.workspace_root.join(".sce").join("tmp")
    }
}

/// Writes `contents` to a fresh UTF-8 temp file under `dir`, creating `dir` first.
pub async fn write_temp_file(dir: &std::path::Path, filename: &str, contents: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    let mut file = tokio::fs::File::create(&path).await?;
    file.write_all(contents.as_bytes()).await?;
    Ok(path)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn probe_command_finds_binary_on_path() {
        let dir = tempdir().unwrap();
        let binary = dir.path().join("my-tool");
        tokio::fs::write(&binary, b"").await.unwrap();
        temp_env::async_with_vars([("PATH", Some(dir.path().to_str().unwrap()))], async {
            let env = OsProcessEnvironment::new(dir.path().to_path_buf());
            let found = env.probe_command("my-tool").await;
            assert_eq!(found, Some(binary));
        })
        .await;
    }

    #[tokio::test]
    async fn probe_command_returns_none_when_absent() {
        let dir = tempdir().unwrap();
        temp_env::async_with_vars([("PATH", Some(dir.path().to_str().unwrap()))], async {
            let env = OsProcessEnvironment::new(dir.path().to_path_buf());
            assert!(env.probe_command("nonexistent-tool-xyz").await.is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn write_temp_file_creates_dir_and_writes_contents() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("tmp");
        let path = write_temp_file(&target, "prompt-abc.txt", "hello").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");
    }
}
