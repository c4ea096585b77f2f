//! CLI command definitions and handlers
//!
//! This module contains all CLI command structures using clap derive macros
//! and their corresponding handler implementations.

pub mod close_loop;
pub mod status;
