//! # fleet-upgrade-core
//!
//! Orchestration core for fleet-wide upgrade campaigns across managed
//! runtimes. A campaign (*orchestration*) groups many per-runtime
//! *operations*; the parallel strategy engine drives each operation to
//! completion while honoring maintenance windows, bounding parallelism and
//! supporting cancellation and targeted retry.

pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod logging;
pub mod model;
pub mod storage;
pub mod strategy;
pub mod web;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use executor::{ExecutorError, OperationExecutor};
pub use strategy::{ExecutionHandle, ParallelStrategy};
