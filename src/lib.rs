//! Spec-driven multi-agent orchestrator
//!
//! Decomposes a natural-language goal into a dependency-aware portfolio of
//! specs, spawns one worker sub-process per spec, and drives the portfolio
//! through replanning and a Definition-of-Done gate until it converges or
//! exhausts its budget.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
