//! Umbrella domain error (C13). The only error type that crosses the CLI boundary.

use thiserror::Error;

use super::error::{ConfigError, DodError, GoalError, OrchestrationError, SessionError, SpawnError, SpecLayoutError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Goal(#[from] GoalError),

    #[error(transparent)]
    SpecLayout(#[from] SpecLayoutError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Dod(#[from] DodError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_via_from() {
        let err: OrchestratorError = ConfigError::EmptyApiKeyEnvVar.into();
        assert!(matches!(err, OrchestratorError::Config(_)));
    }

    #[test]
    fn goal_error_converts_via_from() {
        let err: OrchestratorError = GoalError::EmptyGoal.into();
        assert!(matches!(err, OrchestratorError::Goal(_)));
    }
}
