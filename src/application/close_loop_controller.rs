//! Close-Loop Controller (C8): the outer loop tying goal decomposition,
//! orchestration, replanning, and the DoD gate together into one run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::application::dod_gate::{self, DodGateEvaluator};
use crate::application::goal_decomposer::{DecomposeOptions, GoalDecomposer};
use crate::application::orchestration_engine::{OrchestrationEngine, RunOptions};
use crate::application::spec_materializer::SpecMaterializer;
use crate::application::status_monitor::StatusMonitor;
use crate::domain::error::SessionError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{
    CloseLoopSession, DodConfig, ExhaustionReason, OrchestrationResult, OrchestrationStatus, Portfolio, ReplanConfig,
    ReplanState, ReplanStrategy, SessionStatus, Spec, SpecRole,
};
use crate::domain::ports::{AgentSpawner, CollaborationStore, SessionResumeRef, SessionStore, StrategyStore};

/// Session persistence/resume knobs (`--session*`/`--resume` in the CLI).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub enabled: bool,
    pub session_id: Option<String>,
    pub keep: usize,
    pub older_than_days: u32,
    pub resume: Option<SessionResumeRef>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            session_id: None,
            keep: 20,
            older_than_days: 30,
            resume: None,
        }
    }
}

/// Full set of knobs for one `auto close-loop` invocation.
pub struct CloseLoopOptions {
    pub goal: String,
    pub dry_run: bool,
    pub decompose: DecomposeOptions,
    pub replan: ReplanConfig,
    pub dod: DodConfig,
    pub max_parallel: usize,
    pub session: SessionOptions,
}

pub struct CloseLoopController {
    collaboration: Arc<dyn CollaborationStore>,
    spawner: Arc<dyn AgentSpawner>,
    sessions: Arc<dyn SessionStore>,
    strategy: Arc<dyn StrategyStore>,
    materializer: SpecMaterializer,
    dod: DodGateEvaluator,
    workspace_root: PathBuf,
}

impl CloseLoopController {
    pub fn new(
        collaboration: Arc<dyn CollaborationStore>,
        spawner: Arc<dyn AgentSpawner>,
        sessions: Arc<dyn SessionStore>,
        strategy: Arc<dyn StrategyStore>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        let workspace_root = workspace_root.into();
        let materializer = SpecMaterializer::new(workspace_root.clone(), Arc::clone(&collaboration));
        let dod = DodGateEvaluator::new(workspace_root.clone(), Arc::clone(&collaboration));
        Self {
            collaboration,
            spawner,
            sessions,
            strategy,
            materializer,
            dod,
            workspace_root,
        }
    }

    pub async fn run(&self, options: CloseLoopOptions, cancel: CancellationToken) -> OrchestratorResult<CloseLoopSession> {
        options.replan.validate()?;

        let mut strategy_memory = self.strategy.load().await?;
        let override_history: Vec<f64> = strategy_memory
            .record_for(&options.goal)
            .map(|record| record.success_rate_history.clone())
            .unwrap_or_default();

        let (mut portfolio, resumed, session_id) = self.load_portfolio(&options).await?;

        if options.dry_run {
            tracing::info!(goal = %options.goal, session_id, "dry-run: plan computed, no filesystem side effects");
            return Ok(Self::planned_session(session_id, &options, portfolio));
        }

        if !resumed {
            self.materializer.materialize_portfolio(&portfolio).await?;
            self.write_scheduling_plan(&portfolio).await;
        }

        let mut session = CloseLoopSession {
            schema_version: CloseLoopSession::SCHEMA_VERSION,
            session_id: session_id.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            goal: options.goal.clone(),
            status: SessionStatus::Running,
            portfolio: portfolio.clone(),
            replan_config: options.replan.clone(),
            replan: ReplanState::default(),
            dod: None,
            orchestration: None,
        };
        if options.session.enabled {
            self.sessions.persist(&session).await?;
        }

        let engine = OrchestrationEngine::new(Arc::clone(&self.collaboration), Arc::clone(&self.spawner));
        let master_name = portfolio.master_spec.name.clone();

        let mut replan_state = ReplanState::default();
        let mut progress_window: Vec<(usize, usize)> = Vec::new();
        let mut seen_signatures: HashSet<String> = HashSet::new();
        let mut result: OrchestrationResult;

        loop {
            let cycle_specs: Vec<Spec> = portfolio.all_specs().into_iter().cloned().collect();
            let monitor = StatusMonitor::new(0);
            let run_options = RunOptions {
                max_parallel: options.max_parallel.max(1),
            };
            result = engine.run(&cycle_specs, run_options, &monitor, cancel.clone()).await?;

            if result.status == OrchestrationStatus::Stopped {
                break;
            }

            let mut failed_specs: Vec<String> = result
                .failed
                .iter()
                .chain(result.skipped.iter())
                .filter(|name| **name != master_name)
                .cloned()
                .collect();
            failed_specs.sort();
            failed_specs.dedup();

            if result.status == OrchestrationStatus::Completed || failed_specs.is_empty() {
                break;
            }

            let budget = effective_budget(options.replan.strategy, options.replan.max_attempts, failed_specs.len());

            progress_window.push((result.completed.len(), result.failed.len()));
            if progress_window.len() as u32 > options.replan.no_progress_window {
                progress_window.remove(0);
            }
            if progress_window.len() as u32 >= options.replan.no_progress_window {
                let baseline = progress_window[0];
                let no_progress = progress_window
                    .iter()
                    .all(|(completed, failed)| *completed <= baseline.0 && *failed >= baseline.1);
                if no_progress {
                    replan_state.exhausted = true;
                    replan_state.exhaustion_reason = Some(ExhaustionReason::NoProgress);
                    break;
                }
            }

            let signature = failed_specs.join(",");
            if !seen_signatures.insert(signature.clone()) {
                replan_state.exhausted = true;
                replan_state.exhaustion_reason = Some(ExhaustionReason::StalledSignature);
                replan_state.stalled_signature = Some(signature);
                break;
            }

            if replan_state.performed >= budget {
                break;
            }

            replan_state.performed += 1;
            let remediation = self.synthesize_remediation(&portfolio, replan_state.performed);
            self.materializer.materialize_specs(&[&remediation]).await?;
            let worker_id = uuid::Uuid::new_v4();
            self.collaboration.assign_spec(&remediation.name, &worker_id.to_string()).await?;

            portfolio.master_spec.dependencies.insert(remediation.name.clone());
            portfolio.sub_specs.push(remediation);
            self.collaboration.write_metadata(&portfolio.master_spec).await?;

            if options.session.enabled {
                session.portfolio = portfolio.clone();
                session.replan = replan_state.clone();
                session.updated_at = Utc::now();
                self.sessions.persist(&session).await?;
            }

            tracing::info!(
                cycle = replan_state.performed,
                budget,
                failed = ?failed_specs,
                "replanning with an enlarged spec set"
            );
        }

        let final_specs: Vec<Spec> = portfolio.all_specs().into_iter().cloned().collect();
        let dod_report = self.dod.evaluate(&final_specs, &result, &options.dod, &override_history).await?;
        let dod_passed = dod_report.passed();
        let final_status = CloseLoopSession::final_session_status(result.status, dod_passed);

        self.write_dod_report(&portfolio, &options.dod, &dod_report).await;

        let completion_rate = dod_gate::completion_rate(&result);
        strategy_memory.record_attempt(
            &options.goal,
            result.status,
            options.replan.strategy,
            replan_state.performed,
            options.dod.tests_command.clone(),
            completion_rate,
        );
        for track in &portfolio.tracks {
            strategy_memory.record_track(track, final_status == SessionStatus::Completed);
        }
        self.strategy.save(&strategy_memory).await?;

        session.portfolio = portfolio;
        session.replan = replan_state;
        session.status = final_status;
        session.orchestration = Some(result);
        session.dod = Some(dod_report);
        session.updated_at = Utc::now();

        if options.session.enabled {
            self.sessions.persist(&session).await?;
            let pruned = self
                .sessions
                .prune(options.session.keep, options.session.older_than_days, &session.session_id)
                .await?;
            if pruned > 0 {
                tracing::info!(pruned, "pruned old close-loop sessions");
            }
        }

        Ok(session)
    }

    async fn load_portfolio(&self, options: &CloseLoopOptions) -> OrchestratorResult<(Portfolio, bool, String)> {
        if let Some(reference) = &options.session.resume {
            let resolved = self.sessions.resolve(reference).await?;
            let Some(existing) = resolved else {
                return Err(SessionError::NotFound(format!("{reference:?}")).into());
            };
            tracing::info!(session_id = %existing.session_id, "resuming close-loop session");
            return Ok((existing.portfolio, true, existing.session_id));
        }

        let existing_names = self.materializer.existing_spec_names().await;
        let mut decompose_options = options.decompose.clone();
        decompose_options.existing_spec_names = existing_names;
        let portfolio = GoalDecomposer::decompose(&options.goal, &decompose_options)?;
        let session_id = options
            .session
            .session_id
            .clone()
            .unwrap_or_else(|| format!("{:02}-{}", portfolio.prefix, Utc::now().format("%Y%m%dT%H%M%SZ")));
        Ok((portfolio, false, session_id))
    }

    fn synthesize_remediation(&self, portfolio: &Portfolio, cycle: u32) -> Spec {
        let next_index = portfolio.sub_specs.len() as u32 + 1;
        let name = format!("{:02}-{:02}-replan-remediation-cycle-{cycle}", portfolio.prefix, next_index);
        Spec::new(name, SpecRole::Sub, HashSet::new())
    }

    fn custom_dir(&self, master_name: &str) -> PathBuf {
        self.workspace_root.join(".sce").join("specs").join(master_name).join("custom")
    }

    /// Records the original vs. topologically-batched spec order; best-effort.
    async fn write_scheduling_plan(&self, portfolio: &Portfolio) {
        use crate::domain::models::SpecDag;

        let specs: Vec<Spec> = portfolio.all_specs().into_iter().cloned().collect();
        let original_order: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let dag = SpecDag::from_specs(&specs);
        let Ok(waves) = dag.execution_waves() else {
            tracing::warn!("skipping scheduling plan artifact: dependency cycle detected");
            return;
        };
        let reordered: Vec<String> = waves.into_iter().flatten().collect();
        let auto_reordered = reordered != original_order;

        let dir = self.custom_dir(&portfolio.master_spec.name);
        if tokio::fs::create_dir_all(&dir).await.is_err() {
            return;
        }
        let body = format!(
            "# Agent Sync Plan\n\nOriginal order: {original_order:?}\n\nReordered (topological) order: {reordered:?}\n\nauto_reordered: {auto_reordered}\n"
        );
        if let Err(err) = tokio::fs::write(dir.join("agent-sync-plan.md"), body).await {
            tracing::warn!(error = %err, "failed to write agent-sync-plan.md");
        }
    }

    async fn write_dod_report(&self, portfolio: &Portfolio, config: &DodConfig, report: &crate::domain::models::DodReport) {
        let Ok(body) = serde_json::to_vec_pretty(report) else { return };
        let path = config
            .report_path
            .clone()
            .unwrap_or_else(|| self.custom_dir(&portfolio.master_spec.name).join("dod-report.json"));
        if let Some(parent) = path.parent() {
            if tokio::fs::create_dir_all(parent).await.is_err() {
                return;
            }
        }
        if let Err(err) = tokio::fs::write(&path, body).await {
            tracing::warn!(error = %err, path = %path.display(), "failed to write dod-report.json");
        }
    }

    fn planned_session(session_id: String, options: &CloseLoopOptions, portfolio: Portfolio) -> CloseLoopSession {
        CloseLoopSession {
            schema_version: CloseLoopSession::SCHEMA_VERSION,
            session_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            goal: options.goal.clone(),
            status: SessionStatus::Planned,
            portfolio,
            replan_config: options.replan.clone(),
            replan: ReplanState::default(),
            dod: None,
            orchestration: Some(OrchestrationResult {
                status: OrchestrationStatus::Prepared,
                completed: Vec::new(),
                failed: Vec::new(),
                skipped: Vec::new(),
                duration_ms: 0,
            }),
        }
    }
}

/// `fixed` uses the configured budget verbatim; `adaptive` grows it with the
/// failure count but stays within `[1, 5]`.
fn effective_budget(strategy: ReplanStrategy, max_attempts: u32, failed_count: usize) -> u32 {
    match strategy {
        ReplanStrategy::Fixed => max_attempts,
        ReplanStrategy::Adaptive => {
            let derived = max_attempts.max(failed_count.div_ceil(2) as u32);
            derived.clamp(1, 5)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_budget_is_verbatim() {
        assert_eq!(effective_budget(ReplanStrategy::Fixed, 2, 10), 2);
    }

    #[test]
    fn adaptive_budget_scales_with_failures_but_is_clamped() {
        assert_eq!(effective_budget(ReplanStrategy::Adaptive, 1, 3), 2);
        assert_eq!(effective_budget(ReplanStrategy::Adaptive, 1, 20), 5);
        assert_eq!(effective_budget(ReplanStrategy::Adaptive, 0, 1), 1);
    }

    #[test]
    fn remediation_name_follows_the_cycle_suffix_convention() {
        let master = Spec::new("01-00-goal", SpecRole::Master, HashSet::new());
        let sub = Spec::new("01-01-track", SpecRole::Sub, HashSet::new());
        let portfolio = Portfolio {
            goal: "goal".into(),
            prefix: 1,
            master_spec: master,
            sub_specs: vec![sub],
            tracks: vec!["track".into()],
        };
        let controller_name_only = format!(
            "{:02}-{:02}-replan-remediation-cycle-{}",
            portfolio.prefix,
            portfolio.sub_specs.len() as u32 + 1,
            1
        );
        assert_eq!(controller_name_only, "01-02-replan-remediation-cycle-1");
    }
}
