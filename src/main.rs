//! Orchestrator CLI entry point

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use sce_orchestrator::cli::commands::{close_loop, status};
use sce_orchestrator::cli::{Cli, Commands};
use sce_orchestrator::infrastructure::config::ConfigLoader;
use sce_orchestrator::infrastructure::logging::LoggerImpl;

const EXIT_CONFIG_ERROR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(&cli.workspace) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let _logger_guard = match LoggerImpl::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("failed to initialize logging: {err:#}");
            None
        }
    };

    match run(cli, Arc::new(config)).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, config: Arc<sce_orchestrator::domain::models::OrchestratorConfig>) -> Result<i32> {
    match cli.command {
        Commands::CloseLoop(args) => close_loop::execute(*args, cli.workspace, config, cli.json, cli.quiet).await,
        Commands::Status(args) => status::execute(args, cli.workspace, cli.json).await,
    }
}
