//! Definition-of-Done gate configuration and reporting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DodGateStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DodGateResult {
    pub id: String,
    pub status: DodGateStatus,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

/// Ordered list of gate results; `passed` iff none has `status = failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DodReport {
    pub gates: Vec<DodGateResult>,
}

impl DodReport {
    pub fn passed(&self) -> bool {
        !self.gates.iter().any(|g| g.status == DodGateStatus::Failed)
    }
}

/// Configured thresholds for the DoD gate pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DodConfig {
    pub enabled: bool,
    pub tests_command: Option<String>,
    pub tests_timeout_ms: u64,
    pub max_risk_level: RiskLevel,
    pub kpi_min_completion_rate: f64,
    pub max_success_rate_drop: f64,
    pub baseline_window: usize,
    pub report_path: Option<std::path::PathBuf>,
}

impl Default for DodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tests_command: None,
            tests_timeout_ms: 600_000,
            max_risk_level: RiskLevel::Medium,
            kpi_min_completion_rate: 0.0,
            max_success_rate_drop: 100.0,
            baseline_window: 10,
            report_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_fails_if_any_gate_failed() {
        let report = DodReport {
            gates: vec![
                DodGateResult {
                    id: "docs-complete".into(),
                    status: DodGateStatus::Passed,
                    message: "ok".into(),
                    details: None,
                },
                DodGateResult {
                    id: "tests-command".into(),
                    status: DodGateStatus::Failed,
                    message: "exit 1".into(),
                    details: None,
                },
            ],
        };
        assert!(!report.passed());
    }

    #[test]
    fn report_passes_when_all_passed_or_skipped() {
        let report = DodReport {
            gates: vec![
                DodGateResult {
                    id: "docs-complete".into(),
                    status: DodGateStatus::Passed,
                    message: "ok".into(),
                    details: None,
                },
                DodGateResult {
                    id: "kpi-baseline-drop-threshold".into(),
                    status: DodGateStatus::Skipped,
                    message: "no history".into(),
                    details: None,
                },
            ],
        };
        assert!(report.passed());
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }
}
