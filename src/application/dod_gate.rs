//! Definition-of-Done gate pipeline: an ordered list of checks run at
//! the end of a close-loop cycle, folded into a single `DodReport`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::error::DodError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{DodConfig, DodGateResult, DodGateStatus, DodReport, OrchestrationResult, RiskLevel, Spec, SpecStatus};
use crate::domain::ports::CollaborationStore;

/// Tail-truncation bound for captured tests-command output.
const OUTPUT_CAP_BYTES: usize = 50 * 1024;

pub struct DodGateEvaluator {
    workspace_root: PathBuf,
    collaboration: Arc<dyn CollaborationStore>,
}

impl DodGateEvaluator {
    pub fn new(workspace_root: impl Into<PathBuf>, collaboration: Arc<dyn CollaborationStore>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            collaboration,
        }
    }

    /// Runs every configured gate in order and folds the results into a report.
    /// `historical_success_rates` holds prior sessions' completion-rate percentages
    /// for the same goal signature, oldest first; empty means no history.
    pub async fn evaluate(
        &self,
        specs: &[Spec],
        orchestration: &OrchestrationResult,
        config: &DodConfig,
        historical_success_rates: &[f64],
    ) -> OrchestratorResult<DodReport> {
        if !config.enabled {
            return Ok(DodReport { gates: Vec::new() });
        }

        let mut gates = Vec::new();
        gates.push(self.docs_complete(specs).await);
        gates.push(orchestration_completed(orchestration));
        gates.push(risk_level_threshold(orchestration, config));
        gates.push(kpi_completion_rate_threshold(orchestration, config));
        gates.push(kpi_baseline_drop_threshold(orchestration, config, historical_success_rates));
        gates.push(self.collaboration_completed(specs).await?);
        gates.push(self.tasks_checklist_closed(specs).await);
        gates.push(self.tests_command(config).await?);

        for gate in &gates {
            tracing::info!(gate = %gate.id, status = ?gate.status, "dod gate evaluated");
        }

        Ok(DodReport { gates })
    }

    fn spec_doc_path(&self, spec_name: &str, file: &str) -> PathBuf {
        self.workspace_root.join(".sce/specs").join(spec_name).join(file)
    }

    async fn docs_complete(&self, specs: &[Spec]) -> DodGateResult {
        const DOCS: [&str; 3] = ["requirements.md", "design.md", "tasks.md"];
        let mut missing = Vec::new();
        for spec in specs {
            for doc in DOCS {
                let path = self.spec_doc_path(&spec.name, doc);
                match tokio::fs::read(&path).await {
                    Ok(bytes) if !bytes.is_empty() => {}
                    _ => missing.push(format!("{}/{}", spec.name, doc)),
                }
            }
        }
        if missing.is_empty() {
            DodGateResult {
                id: "docs-complete".into(),
                status: DodGateStatus::Passed,
                message: "all spec documents present and non-empty".into(),
                details: None,
            }
        } else {
            DodGateResult {
                id: "docs-complete".into(),
                status: DodGateStatus::Failed,
                message: format!("{} document(s) missing or empty", missing.len()),
                details: Some(serde_json::json!({ "missing": missing })),
            }
        }
    }

    async fn tasks_checklist_closed(&self, specs: &[Spec]) -> DodGateResult {
        let mut open: Vec<String> = Vec::new();
        for spec in specs {
            let path = self.spec_doc_path(&spec.name, "tasks.md");
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                if content.lines().any(is_unchecked_item) {
                    open.push(spec.name.clone());
                }
            }
        }
        if open.is_empty() {
            DodGateResult {
                id: "tasks-checklist-closed".into(),
                status: DodGateStatus::Passed,
                message: "no open checklist items".into(),
                details: None,
            }
        } else {
            DodGateResult {
                id: "tasks-checklist-closed".into(),
                status: DodGateStatus::Failed,
                message: format!("{} spec(s) have unchecked tasks", open.len()),
                details: Some(serde_json::json!({ "specs": open })),
            }
        }
    }

    /// Checks each spec's status as persisted in the collaboration store, not the
    /// in-memory `Spec` the controller carries — the engine never mutates those,
    /// it only writes status through `CollaborationStore::update_status`.
    async fn collaboration_completed(&self, specs: &[Spec]) -> OrchestratorResult<DodGateResult> {
        let mut incomplete = Vec::new();
        for spec in specs {
            let persisted = self.collaboration.read_metadata(&spec.name).await?;
            let status = persisted.map_or(SpecStatus::NotStarted, |s| s.status);
            if status != SpecStatus::Completed {
                incomplete.push(spec.name.clone());
            }
        }
        Ok(if incomplete.is_empty() {
            DodGateResult {
                id: "collaboration-completed".into(),
                status: DodGateStatus::Passed,
                message: "every spec's persisted status is completed".into(),
                details: None,
            }
        } else {
            DodGateResult {
                id: "collaboration-completed".into(),
                status: DodGateStatus::Failed,
                message: format!("{} spec(s) not completed", incomplete.len()),
                details: Some(serde_json::json!({ "specs": incomplete })),
            }
        })
    }

    async fn tests_command(&self, config: &DodConfig) -> OrchestratorResult<DodGateResult> {
        let Some(command) = config.tests_command.as_ref() else {
            return Ok(DodGateResult {
                id: "tests-command".into(),
                status: DodGateStatus::Skipped,
                message: "no tests command configured".into(),
                details: None,
            });
        };

        let run = run_shell_command(command, &self.workspace_root);
        let outcome = timeout(Duration::from_millis(config.tests_timeout_ms), run).await;

        match outcome {
            Err(_) => Err(DodError::TestsTimedOut {
                command: command.clone(),
                timeout_ms: config.tests_timeout_ms,
            }
            .into()),
            Ok(Err(source)) => Err(DodError::TestsExecFailed {
                command: command.clone(),
                source,
            }
            .into()),
            Ok(Ok(captured)) => {
                let status = if captured.exit_success {
                    DodGateStatus::Passed
                } else {
                    DodGateStatus::Failed
                };
                Ok(DodGateResult {
                    id: "tests-command".into(),
                    status,
                    message: format!("`{command}` exited {}", if captured.exit_success { "0" } else { "non-zero" }),
                    details: Some(serde_json::json!({ "output": captured.output })),
                })
            }
        }
    }
}

fn is_unchecked_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- [ ]") || trimmed.starts_with("* [ ]")
}

fn orchestration_completed(orchestration: &OrchestrationResult) -> DodGateResult {
    use crate::domain::models::OrchestrationStatus;
    if orchestration.status == OrchestrationStatus::Completed {
        DodGateResult {
            id: "orchestration-completed".into(),
            status: DodGateStatus::Passed,
            message: "orchestration terminal state is completed".into(),
            details: None,
        }
    } else {
        DodGateResult {
            id: "orchestration-completed".into(),
            status: DodGateStatus::Failed,
            message: format!("orchestration terminal state is {:?}", orchestration.status),
            details: None,
        }
    }
}

fn derive_risk_level(orchestration: &OrchestrationResult) -> RiskLevel {
    use crate::domain::models::OrchestrationStatus;
    let total = orchestration.completed.len() + orchestration.failed.len() + orchestration.skipped.len();
    if total == 0 {
        return RiskLevel::Medium;
    }
    let failed_ratio = (orchestration.failed.len() + orchestration.skipped.len()) as f64 / total as f64;
    if orchestration.status == OrchestrationStatus::Completed && orchestration.failed.is_empty() {
        RiskLevel::Low
    } else if failed_ratio >= 0.4 {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

fn risk_level_threshold(orchestration: &OrchestrationResult, config: &DodConfig) -> DodGateResult {
    let risk = derive_risk_level(orchestration);
    if risk <= config.max_risk_level {
        DodGateResult {
            id: "risk-level-threshold".into(),
            status: DodGateStatus::Passed,
            message: format!("risk {risk:?} within max {:?}", config.max_risk_level),
            details: None,
        }
    } else {
        DodGateResult {
            id: "risk-level-threshold".into(),
            status: DodGateStatus::Failed,
            message: format!("risk {risk:?} exceeds max {:?}", config.max_risk_level),
            details: None,
        }
    }
}

pub(crate) fn completion_rate(orchestration: &OrchestrationResult) -> f64 {
    let total = orchestration.completed.len() + orchestration.failed.len() + orchestration.skipped.len();
    if total == 0 {
        return 0.0;
    }
    orchestration.completed.len() as f64 / total as f64 * 100.0
}

fn kpi_completion_rate_threshold(orchestration: &OrchestrationResult, config: &DodConfig) -> DodGateResult {
    let rate = completion_rate(orchestration);
    if rate >= config.kpi_min_completion_rate {
        DodGateResult {
            id: "kpi-completion-rate-threshold".into(),
            status: DodGateStatus::Passed,
            message: format!("completion rate {rate:.1}% >= min {:.1}%", config.kpi_min_completion_rate),
            details: None,
        }
    } else {
        DodGateResult {
            id: "kpi-completion-rate-threshold".into(),
            status: DodGateStatus::Failed,
            message: format!("completion rate {rate:.1}% < min {:.1}%", config.kpi_min_completion_rate),
            details: None,
        }
    }
}

fn kpi_baseline_drop_threshold(orchestration: &OrchestrationResult, config: &DodConfig, history: &[f64]) -> DodGateResult {
    if history.is_empty() {
        return DodGateResult {
            id: "kpi-baseline-drop-threshold".into(),
            status: DodGateStatus::Skipped,
            message: "no session history available".into(),
            details: None,
        };
    }
    let window = &history[history.len().saturating_sub(config.baseline_window)..];
    let average = window.iter().sum::<f64>() / window.len() as f64;
    let current = completion_rate(orchestration);
    let drop = average - current;
    if drop <= config.max_success_rate_drop {
        DodGateResult {
            id: "kpi-baseline-drop-threshold".into(),
            status: DodGateStatus::Passed,
            message: format!("drop {drop:.1}% within max {:.1}%", config.max_success_rate_drop),
            details: Some(serde_json::json!({ "baseline_average": average, "current": current })),
        }
    } else {
        DodGateResult {
            id: "kpi-baseline-drop-threshold".into(),
            status: DodGateStatus::Failed,
            message: format!("drop {drop:.1}% exceeds max {:.1}%", config.max_success_rate_drop),
            details: Some(serde_json::json!({ "baseline_average": average, "current": current })),
        }
    }
}

struct CapturedRun {
    exit_success: bool,
    output: String,
}

async fn run_shell_command(command: &str, cwd: &Path) -> std::io::Result<CapturedRun> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()?;

    let mut stdout = child.stdout.take().expect("piped stdout");
    let mut stderr = child.stderr.take().expect("piped stderr");
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let _ = stdout.read_to_end(&mut stdout_buf).await;
    let _ = stderr.read_to_end(&mut stderr_buf).await;

    let status = child.wait().await?;
    let mut combined = String::from_utf8_lossy(&stdout_buf).into_owned();
    combined.push_str(&String::from_utf8_lossy(&stderr_buf));
    let tail = tail_bytes(&combined, OUTPUT_CAP_BYTES);

    Ok(CapturedRun {
        exit_success: status.success(),
        output: tail,
    })
}

fn tail_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let start = s.len() - max_bytes;
    let boundary = (start..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(start);
    s[boundary..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OrchestrationStatus;

    fn result(completed: usize, failed: usize, skipped: usize, status: OrchestrationStatus) -> OrchestrationResult {
        OrchestrationResult {
            status,
            completed: (0..completed).map(|i| format!("c{i}")).collect(),
            failed: (0..failed).map(|i| format!("f{i}")).collect(),
            skipped: (0..skipped).map(|i| format!("s{i}")).collect(),
            duration_ms: 0,
        }
    }

    #[test]
    fn risk_is_low_when_completed_with_no_failures() {
        let r = result(3, 0, 0, OrchestrationStatus::Completed);
        assert_eq!(derive_risk_level(&r), RiskLevel::Low);
    }

    #[test]
    fn risk_is_high_above_forty_percent_failure_ratio() {
        let r = result(1, 2, 0, OrchestrationStatus::PartialFailed);
        assert_eq!(derive_risk_level(&r), RiskLevel::High);
    }

    #[test]
    fn baseline_drop_skipped_without_history() {
        let r = result(2, 0, 0, OrchestrationStatus::Completed);
        let config = DodConfig::default();
        let gate = kpi_baseline_drop_threshold(&r, &config, &[]);
        assert_eq!(gate.status, DodGateStatus::Skipped);
    }

    #[test]
    fn baseline_drop_fails_when_drop_exceeds_max() {
        let r = result(1, 1, 0, OrchestrationStatus::PartialFailed);
        let mut config = DodConfig::default();
        config.max_success_rate_drop = 5.0;
        let gate = kpi_baseline_drop_threshold(&r, &config, &[100.0, 100.0]);
        assert_eq!(gate.status, DodGateStatus::Failed);
    }

    #[test]
    fn tail_bytes_truncates_to_the_end() {
        let s = "a".repeat(100);
        let truncated = tail_bytes(&s, 10);
        assert_eq!(truncated.len(), 10);
    }
}
