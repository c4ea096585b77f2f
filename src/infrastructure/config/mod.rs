//! Configuration management infrastructure (C12)
//!
//! Loads `orchestrator.json`, merges environment-variable overrides through
//! `figment`, and validates the result into a typed `OrchestratorConfig`.

pub mod loader;

pub use loader::ConfigLoader;
