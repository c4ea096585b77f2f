//! Process Environment port: isolates the Agent Spawner from real env vars,
//! the credential file, and command probing so it is stubbable in tests
//! (process-global state).

use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait ProcessEnvironment: Send + Sync {
    /// Reads an environment variable, if set.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Reads `OPENAI_API_KEY`/`CODEX_API_KEY` from a JSON credential file in
    /// the user's home directory, if present.
    async fn read_credential_file(&self) -> Option<String>;

    /// Probes `PATH` for a native binary with this name.
    async fn probe_command(&self, name: &str) -> Option<PathBuf>;

    /// Workspace-relative temp directory for prompt files.
    fn temp_dir(&self) -> PathBuf;
}
