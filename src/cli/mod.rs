//! CLI interface module
//!
//! This module contains all command-line interface components including
//! command definitions, handlers, and terminal output formatting.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, CloseLoopArgs, Commands, ReplanStrategyArg, RiskLevelArg, StatusArgs};
