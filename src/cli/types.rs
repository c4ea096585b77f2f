//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "auto")]
#[command(about = "Spec-driven close-loop agent orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Suppress non-essential stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decompose a goal into a spec portfolio and drive it to completion
    CloseLoop(Box<CloseLoopArgs>),

    /// Show the last-persisted snapshot of a close-loop session
    Status(StatusArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReplanStrategyArg {
    Fixed,
    Adaptive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RiskLevelArg {
    Low,
    Medium,
    High,
}

#[derive(clap::Args)]
pub struct CloseLoopArgs {
    /// Natural-language goal to decompose and drive to completion
    pub goal: String,

    /// Compute the portfolio and plan but spawn no workers
    #[arg(long)]
    pub dry_run: bool,

    /// Force-run even if `--dry-run` was also given (last one wins)
    #[arg(long, conflicts_with = "dry_run")]
    pub run: bool,

    /// Pin the portfolio's numeric prefix instead of auto-resolving it
    #[arg(long)]
    pub prefix: Option<i64>,

    /// Pin the number of sub-specs (2..=5) instead of inferring it from the goal
    #[arg(long, value_parser = clap::value_parser!(u8).range(2..=5))]
    pub subs: Option<u8>,

    /// Replan budget strategy
    #[arg(long, value_enum, default_value_t = ReplanStrategyArg::Fixed)]
    pub replan_strategy: ReplanStrategyArg,

    /// Maximum replan cycles (0..=5)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=5), default_value_t = 0)]
    pub replan_attempts: u32,

    /// Consecutive cycles with no completed/failed improvement before giving up (1..=10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10), default_value_t = 3)]
    pub replan_no_progress_window: u32,

    /// Run the Definition-of-Done gate after orchestration (default)
    #[arg(long, overrides_with = "no_dod")]
    pub dod: bool,

    /// Disable the Definition-of-Done gate
    #[arg(long, overrides_with = "dod")]
    pub no_dod: bool,

    /// Shell command run as the DoD tests gate
    #[arg(long)]
    pub dod_tests: Option<String>,

    /// Timeout in milliseconds for `--dod-tests`
    #[arg(long, default_value_t = 600_000)]
    pub dod_tests_timeout: u64,

    /// Highest risk level the DoD gate will accept
    #[arg(long, value_enum, default_value_t = RiskLevelArg::Medium)]
    pub dod_max_risk_level: RiskLevelArg,

    /// Minimum completion-rate percentage (0..=100) required to pass
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value_t = 0)]
    pub dod_kpi_min_completion_rate: u8,

    /// Maximum allowed drop (0..=100) below the rolling baseline completion rate
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value_t = 100)]
    pub dod_max_success_rate_drop: u8,

    /// Number of past runs considered for the baseline-drop gate (1..=50)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=50), default_value_t = 10)]
    pub dod_baseline_window: u32,

    /// Where to write `dod-report.json` (defaults under `.sce/specs/<master>/custom`)
    #[arg(long)]
    pub dod_report: Option<PathBuf>,

    /// Persist and resume close-loop sessions (default)
    #[arg(long, overrides_with = "no_session")]
    pub session: bool,

    /// Disable session persistence for this run
    #[arg(long, overrides_with = "session")]
    pub no_session: bool,

    /// Session identifier to use instead of deriving one from the goal/prefix
    #[arg(long)]
    pub session_id: Option<String>,

    /// Number of past sessions to keep, most-recent-first (0..=1000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=1000), default_value_t = 20)]
    pub session_keep: u32,

    /// Prune sessions older than this many days (0..=36500)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=36500), default_value_t = 30)]
    pub session_older_than_days: u32,

    /// Resume a previous session: `latest`, `interrupted`, a session id, or a path
    #[arg(long)]
    pub resume: Option<String>,

    /// Maximum number of workers running at once
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Write the final session snapshot to this path in addition to stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Session id (or prefix) to inspect
    pub session_id: String,
}
