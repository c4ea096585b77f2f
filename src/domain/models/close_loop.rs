//! Close-loop controller session state and replan configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dod::DodReport;
use super::orchestration::{OrchestrationResult, OrchestrationStatus};
use super::spec::Portfolio;
use crate::domain::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplanStrategy {
    Fixed,
    Adaptive,
}

/// Validated replan budget; `ConfigError` before use if bounds are violated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplanConfig {
    pub strategy: ReplanStrategy,
    pub max_attempts: u32,
    pub no_progress_window: u32,
}

impl Default for ReplanConfig {
    fn default() -> Self {
        Self {
            strategy: ReplanStrategy::Fixed,
            max_attempts: 0,
            no_progress_window: 3,
        }
    }
}

impl ReplanConfig {
    /// `maxAttempts` must sit in `[0, 5]` and `noProgressWindow` in `[1, 10]`; out-of-range
    /// values are rejected up front rather than clamped silently.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_attempts > 5 {
            return Err(SessionError::InvalidReplanConfig(format!(
                "max_attempts {} out of range [0, 5]",
                self.max_attempts
            )));
        }
        if !(1..=10).contains(&self.no_progress_window) {
            return Err(SessionError::InvalidReplanConfig(format!(
                "no_progress_window {} out of range [1, 10]",
                self.no_progress_window
            )));
        }
        Ok(())
    }
}

/// Why a replan loop stopped attempting further cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionReason {
    NoProgress,
    StalledSignature,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplanState {
    pub performed: u32,
    pub exhausted: bool,
    pub exhaustion_reason: Option<ExhaustionReason>,
    pub stalled_signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Dry-run result: a portfolio and plan were computed but nothing ran.
    Planned,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Persisted snapshot sufficient to rebuild close-loop controller state and resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseLoopSession {
    pub schema_version: u32,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub goal: String,
    pub status: SessionStatus,
    pub portfolio: Portfolio,
    pub replan_config: ReplanConfig,
    pub replan: ReplanState,
    pub dod: Option<DodReport>,
    pub orchestration: Option<OrchestrationResult>,
}

impl CloseLoopSession {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn final_session_status(orchestration_status: OrchestrationStatus, dod_passed: bool) -> SessionStatus {
        match orchestration_status {
            OrchestrationStatus::Stopped => SessionStatus::Stopped,
            OrchestrationStatus::Completed if dod_passed => SessionStatus::Completed,
            _ => SessionStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dod_failure_demotes_completed_to_failed() {
        assert_eq!(
            CloseLoopSession::final_session_status(OrchestrationStatus::Completed, false),
            SessionStatus::Failed
        );
    }

    #[test]
    fn stopped_orchestration_yields_stopped_session() {
        assert_eq!(
            CloseLoopSession::final_session_status(OrchestrationStatus::Stopped, true),
            SessionStatus::Stopped
        );
    }
}
