//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod close_loop;
pub mod config;
pub mod dag;
pub mod dod;
pub mod orchestration;
pub mod spec;
pub mod strategy;
pub mod worker;

pub use close_loop::{
    CloseLoopSession, ExhaustionReason, ReplanConfig, ReplanState, ReplanStrategy, SessionStatus,
};
pub use config::{LogConfig, LogFormat, OrchestratorConfig, RotationPolicy};
pub use dag::{DagError, DagStats, SpecDag};
pub use dod::{DodConfig, DodGateResult, DodGateStatus, DodReport, RiskLevel};
pub use orchestration::{OrchestrationResult, OrchestrationStatus, SpecStatusEntry, StatusSnapshot};
pub use spec::{derive_lease_key, Portfolio, Spec, SpecRole, SpecStatus};
pub use strategy::{GoalRecord, StrategyMemory, TrackRecord};
pub use worker::{SpawnedWorker, WorkerEvent, WorkerStatus};
