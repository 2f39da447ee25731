//! Core data model: orchestration and operation records, their state
//! machines, and the strategy spec that governs an orchestration's execution.

pub mod operation;
pub mod orchestration;
pub mod strategy;

pub use operation::{OperationState, RuntimeOperation};
pub use orchestration::{Orchestration, OrchestrationKind, OrchestrationState};
pub use strategy::{ParallelSpec, ScheduleKind, StrategySpec};
