//! Typed configuration records produced by the configuration layer (C12).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    Never,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Daily
    }
}

/// Drives C11 (Logging & Diagnostics).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RotationPolicy,

    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
            enable_stdout: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

/// The single typed result of C12, `Arc`-shared into every component that needs it.
///
/// Field names follow `orchestrator.json`'s camelCase wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Env var name carrying the worker's API key, e.g. `CODEX_API_KEY`.
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,

    /// Worker binary; `None` triggers auto-detect in the `ProcessEnvironment`.
    #[serde(default)]
    pub codex_command: Option<String>,

    /// Extra tokens appended to the fixed invocation argument set.
    #[serde(default)]
    pub codex_args: Vec<String>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Path to, or inline contents of, a custom bootstrap prompt template.
    #[serde(default)]
    pub bootstrap_template: Option<String>,

    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default)]
    pub logging: LogConfig,
}

fn default_api_key_env_var() -> String {
    "CODEX_API_KEY".to_string()
}

const fn default_timeout_seconds() -> u64 {
    300
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_key_env_var: default_api_key_env_var(),
            codex_command: None,
            codex_args: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
            bootstrap_template: None,
            workspace_root: default_workspace_root(),
            max_parallel: default_max_parallel(),
            logging: LogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.api_key_env_var, "CODEX_API_KEY");
        assert_eq!(config.timeout_seconds, 300);
        assert!(config.max_parallel >= 1);
    }

    #[test]
    fn log_config_defaults_to_pretty_on_stdout() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.enable_stdout);
        assert!(config.log_dir.is_none());
    }
}
