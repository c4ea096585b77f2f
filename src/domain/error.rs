//! Per-component error types (C13).
//!
//! Each enum represents the errors a single component can raise.
//! Only the umbrella `OrchestratorError` in `domain::errors` crosses into the CLI layer.

use thiserror::Error;

/// Errors raised loading, merging, or validating `OrchestratorConfig` (C12).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid timeout_seconds: {0}, must be positive")]
    InvalidTimeout(u64),

    #[error("invalid max_parallel: {0}, must be at least 1")]
    InvalidMaxParallel(usize),

    #[error("codex command '{0}' could not be resolved and is not on PATH")]
    CommandUnresolved(String),

    #[error("api_key_env_var cannot be empty")]
    EmptyApiKeyEnvVar,

    #[error("failed to extract configuration: {0}")]
    ExtractFailed(String),
}

/// Errors raised by the goal decomposer (C6).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoalError {
    #[error("goal is required")]
    EmptyGoal,

    #[error("invalid sub count: {0}, must be between 2 and 5")]
    InvalidSubCount(u8),

    #[error("invalid prefix: {0}, must be a positive integer")]
    InvalidPrefix(i64),
}

/// Errors raised materializing or reading spec documents (C1, C6, C8).
#[derive(Error, Debug)]
pub enum SpecLayoutError {
    #[error("spec directory already exists: {0}")]
    AlreadyExists(String),

    #[error("spec not found: {0}")]
    NotFound(String),

    #[error("io error for spec '{spec}': {source}")]
    Io {
        spec: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised spawning or supervising a worker (C3).
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("no API key found in env var '{0}' or credential file")]
    MissingCredential(String),

    #[error("prompt assembly produced empty output for spec '{0}'")]
    EmptyPrompt(String),

    #[error("worker command could not be resolved")]
    CommandNotFound,

    #[error("failed to spawn worker process: {0}")]
    ProcessSpawnFailed(String),

    #[error("failed to write prompt temp file: {0}")]
    TempFileFailed(String),
}

/// Errors raised by the orchestration engine (C7).
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("dependency cycle detected among input specs")]
    CycleDetected,

    #[error("unknown spec referenced: {0}")]
    UnknownSpec(String),

    #[error("collaboration store error: {0}")]
    StoreError(String),
}

/// Errors raised evaluating the DoD gate pipeline.
#[derive(Error, Debug)]
pub enum DodError {
    #[error("tests command '{command}' timed out after {timeout_ms}ms")]
    TestsTimedOut { command: String, timeout_ms: u64 },

    #[error("failed to execute tests command '{command}': {source}")]
    TestsExecFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid DoD configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised persisting or resuming close-loop sessions and strategy memory (C8, C9, C10).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("failed to read session file '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write session file '{path}': {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize session: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid replan configuration: {0}")]
    InvalidReplanConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidMaxParallel(0);
        assert_eq!(err.to_string(), "invalid max_parallel: 0, must be at least 1");
    }

    #[test]
    fn goal_error_invalid_sub_count_display() {
        let err = GoalError::InvalidSubCount(7);
        assert_eq!(err.to_string(), "invalid sub count: 7, must be between 2 and 5");
    }

    #[test]
    fn spawn_error_missing_credential_display() {
        let err = SpawnError::MissingCredential("CODEX_API_KEY".to_string());
        assert!(err.to_string().contains("CODEX_API_KEY"));
    }

    #[test]
    fn orchestration_error_cycle_display() {
        assert_eq!(
            OrchestrationError::CycleDetected.to_string(),
            "dependency cycle detected among input specs"
        );
    }

    #[test]
    fn dod_error_timeout_display() {
        let err = DodError::TestsTimedOut {
            command: "cargo test".to_string(),
            timeout_ms: 600_000,
        };
        assert!(err.to_string().contains("cargo test"));
    }
}
