//! Domain ports (interfaces) for the orchestrator.

pub mod agent_spawner;
pub mod collaboration_store;
pub mod process_environment;
pub mod session_store;
pub mod strategy_store;

pub use agent_spawner::AgentSpawner;
pub use collaboration_store::CollaborationStore;
pub use process_environment::ProcessEnvironment;
pub use session_store::{SessionResumeRef, SessionStore};
pub use strategy_store::StrategyStore;
