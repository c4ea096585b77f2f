//! Application layer
//!
//! Use-case services wired directly from the domain ports: prompt assembly,
//! the in-process agent registry, goal decomposition, orchestration, the DoD
//! gate pipeline, and the outer close-loop controller that ties them
//! together.

pub mod agent_registry;
pub mod close_loop_controller;
pub mod dod_gate;
pub mod goal_decomposer;
pub mod orchestration_engine;
pub mod prompt_assembler;
pub mod spec_materializer;
pub mod status_monitor;

pub use agent_registry::AgentRegistry;
pub use close_loop_controller::{CloseLoopController, CloseLoopOptions, SessionOptions};
pub use dod_gate::DodGateEvaluator;
pub use goal_decomposer::{DecomposeOptions, GoalDecomposer};
pub use orchestration_engine::{OrchestrationEngine, RunOptions};
pub use prompt_assembler::PromptAssembler;
pub use spec_materializer::SpecMaterializer;
pub use status_monitor::StatusMonitor;
