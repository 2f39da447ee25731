//! # Web API Application State
//!
//! Shared state for the control surface: storage handles, the per-kind
//! strategy instances, and the retry/cancel entry points built on them.

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::control::{Canceler, Retryer};
use crate::storage::{OperationStore, OrchestrationStore};
use crate::strategy::ParallelStrategy;

/// Shared application state for the control surface.
#[derive(Clone)]
pub struct AppState {
    pub orchestrations: Arc<dyn OrchestrationStore>,
    pub operations: Arc<dyn OperationStore>,
    pub retryer: Arc<Retryer>,
    pub canceler: Arc<Canceler>,
    /// Upper bound on the page size accepted by list endpoints.
    pub default_max_page: u32,
}

impl AppState {
    pub fn new(
        orchestrations: Arc<dyn OrchestrationStore>,
        operations: Arc<dyn OperationStore>,
        kyma_strategy: Arc<ParallelStrategy>,
        cluster_strategy: Arc<ParallelStrategy>,
        config: &OrchestratorConfig,
    ) -> Self {
        let retryer = Arc::new(Retryer::new(
            Arc::clone(&orchestrations),
            Arc::clone(&operations),
            Arc::clone(&kyma_strategy),
            Arc::clone(&cluster_strategy),
        ));
        let canceler = Arc::new(Canceler::new(
            Arc::clone(&orchestrations),
            kyma_strategy,
            cluster_strategy,
        ));
        Self {
            orchestrations,
            operations,
            retryer,
            canceler,
            default_max_page: config.default_max_page,
        }
    }
}
