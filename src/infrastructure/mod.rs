//! Infrastructure layer
//!
//! Adapts external concerns — process-wide configuration and structured
//! logging — for the application layer. Persistence adapters for the
//! collaboration store, session store, and strategy memory live under
//! `adapters`, alongside the agent spawner.

pub mod config;
pub mod logging;
