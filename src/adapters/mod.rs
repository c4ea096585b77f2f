//! Adapters layer
//!
//! Concrete implementations of the domain ports: file-backed persistence for
//! the collaboration store, session store, and strategy memory, plus the
//! Codex CLI agent spawner and the OS process environment it depends on.

pub mod codex_spawner;
pub mod collaboration_store;
pub mod process_environment;
pub mod session_store;
pub mod strategy_store;

pub use codex_spawner::CodexCliSpawner;
pub use collaboration_store::FileCollaborationStore;
pub use process_environment::OsProcessEnvironment;
pub use session_store::FileSessionStore;
pub use strategy_store::FileStrategyStore;
