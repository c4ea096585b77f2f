//! Implementation of the `auto close-loop` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::adapters::{CodexCliSpawner, FileCollaborationStore, FileSessionStore, FileStrategyStore, OsProcessEnvironment};
use crate::application::agent_registry::AgentRegistry;
use crate::application::close_loop_controller::{CloseLoopController, CloseLoopOptions, SessionOptions};
use crate::application::goal_decomposer::DecomposeOptions;
use crate::application::prompt_assembler::PromptAssembler;
use crate::cli::output::progress::{create_spinner, ProgressBarExt};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::types::{CloseLoopArgs, RiskLevelArg};
use crate::domain::models::{CloseLoopSession, DodConfig, OrchestratorConfig, ReplanConfig, ReplanStrategy, RiskLevel, SessionStatus};
use crate::domain::ports::SessionResumeRef;

pub struct CloseLoopOutput {
    session: CloseLoopSession,
}

impl CommandOutput for CloseLoopOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_session(&self.session)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.session).unwrap_or_default()
    }
}

fn parse_resume(raw: &str) -> SessionResumeRef {
    match raw {
        "latest" => SessionResumeRef::Latest,
        "interrupted" => SessionResumeRef::Interrupted,
        _ if raw.contains(std::path::MAIN_SEPARATOR) || raw.ends_with(".json") => {
            SessionResumeRef::Path(PathBuf::from(raw))
        }
        other => SessionResumeRef::Id(other.to_string()),
    }
}

fn build_replan_config(args: &CloseLoopArgs) -> ReplanConfig {
    ReplanConfig {
        strategy: match args.replan_strategy {
            crate::cli::types::ReplanStrategyArg::Fixed => ReplanStrategy::Fixed,
            crate::cli::types::ReplanStrategyArg::Adaptive => ReplanStrategy::Adaptive,
        },
        max_attempts: args.replan_attempts,
        no_progress_window: args.replan_no_progress_window,
    }
}

fn build_dod_config(args: &CloseLoopArgs) -> DodConfig {
    DodConfig {
        enabled: args.dod && !args.no_dod,
        tests_command: args.dod_tests.clone(),
        tests_timeout_ms: args.dod_tests_timeout,
        max_risk_level: match args.dod_max_risk_level {
            RiskLevelArg::Low => RiskLevel::Low,
            RiskLevelArg::Medium => RiskLevel::Medium,
            RiskLevelArg::High => RiskLevel::High,
        },
        kpi_min_completion_rate: f64::from(args.dod_kpi_min_completion_rate),
        max_success_rate_drop: f64::from(args.dod_max_success_rate_drop),
        baseline_window: args.dod_baseline_window as usize,
        report_path: args.dod_report.clone(),
    }
}

fn build_session_options(args: &CloseLoopArgs) -> SessionOptions {
    SessionOptions {
        enabled: args.session && !args.no_session,
        session_id: args.session_id.clone(),
        keep: args.session_keep as usize,
        older_than_days: args.session_older_than_days,
        resume: args.resume.as_deref().map(parse_resume),
    }
}

/// Exit code mapped from the session's final status, per the CLI contract:
/// 0 on completion, 1 on failure, 2 when stopped (e.g. ctrl-c).
fn exit_code_for(status: SessionStatus) -> i32 {
    match status {
        SessionStatus::Completed | SessionStatus::Planned => 0,
        SessionStatus::Stopped => 2,
        SessionStatus::Running | SessionStatus::Failed => 1,
    }
}

pub async fn execute(
    args: CloseLoopArgs,
    workspace_root: PathBuf,
    config: Arc<OrchestratorConfig>,
    json_mode: bool,
    quiet: bool,
) -> Result<i32> {
    let collaboration = Arc::new(FileCollaborationStore::new(workspace_root.clone()));
    let sessions = Arc::new(FileSessionStore::new(workspace_root.clone()));
    let strategy = Arc::new(FileStrategyStore::new(workspace_root.clone()));
    let process_env = Arc::new(OsProcessEnvironment::new(workspace_root.clone()));
    let registry = Arc::new(AgentRegistry::new());
    let prompt_assembler = Arc::new(PromptAssembler::new(workspace_root.clone(), config.bootstrap_template.clone()));
    let spawner = Arc::new(CodexCliSpawner::new(Arc::clone(&config), process_env, registry, prompt_assembler));

    let controller = CloseLoopController::new(
        collaboration,
        spawner,
        sessions,
        strategy,
        workspace_root,
    );

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, stopping after the in-flight batch");
            cancel_for_signal.cancel();
        }
    });

    let max_parallel = args.max_parallel.unwrap_or(config.max_parallel);
    let options = CloseLoopOptions {
        goal: args.goal.clone(),
        dry_run: args.dry_run && !args.run,
        decompose: DecomposeOptions {
            sub_count: args.subs,
            prefix: args.prefix,
            track_bias: Default::default(),
            existing_spec_names: Vec::new(),
        },
        replan: build_replan_config(&args),
        dod: build_dod_config(&args),
        max_parallel,
        session: build_session_options(&args),
    };

    let spinner = create_spinner(format!("decomposing and driving: {}", args.goal), quiet || json_mode);
    let run_result = controller.run(options, cancel).await;
    match &run_result {
        Ok(session) => spinner.finish_success(format!("close-loop finished: {:?}", session.status)),
        Err(err) => spinner.finish_error(format!("close-loop failed: {err}")),
    }
    let session = run_result.context("close-loop run failed")?;

    if let Some(out_path) = &args.out {
        let body = serde_json::to_vec_pretty(&session).context("failed to serialize session snapshot")?;
        tokio::fs::write(out_path, body).await.with_context(|| format!("failed to write {}", out_path.display()))?;
    }

    let exit_code = exit_code_for(session.status);
    if !quiet {
        output(&CloseLoopOutput { session }, json_mode);
    }
    Ok(exit_code)
}
