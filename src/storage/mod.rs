//! # Storage Contract
//!
//! The orchestration core does not own persistence. These traits describe the
//! contract a backing store must satisfy; the strategy, retryer, canceler and
//! web layer consume them. `memory::InMemoryStore` is a complete in-process
//! implementation backing tests and embedders without a database.

pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::model::{
    Orchestration, OrchestrationKind, OrchestrationState, OperationState, RuntimeOperation,
};

pub use memory::InMemoryStore;

/// Storage failures, distinguishable as not-found vs anything else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Pagination window for list queries. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 100,
        }
    }
}

/// One page of results plus totals for the caller's pagination UI.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    /// Number of items in this page.
    pub count: usize,
    /// Number of items matching the filter across all pages.
    pub total_count: usize,
}

/// Filter for orchestration list queries. Empty `states` matches everything.
#[derive(Debug, Clone, Default)]
pub struct OrchestrationFilter {
    pub page: Option<Page>,
    pub states: Vec<OrchestrationState>,
}

/// Filter for operation list queries. Empty `states` matches everything.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub page: Option<Page>,
    pub states: Vec<OperationState>,
}

impl OperationFilter {
    /// Candidate set for the retry control path, derived from
    /// [`OperationState::is_retriable`].
    pub fn retriable() -> Self {
        Self {
            page: None,
            states: OperationState::ALL
                .into_iter()
                .filter(|state| state.is_retriable())
                .collect(),
        }
    }
}

/// Per-state operation counts for one orchestration.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OperationStats {
    pub by_state: BTreeMap<String, usize>,
}

impl OperationStats {
    pub fn record(&mut self, state: OperationState) {
        *self.by_state.entry(state.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, state: OperationState) -> usize {
        self.by_state.get(&state.to_string()).copied().unwrap_or(0)
    }
}

/// Persistence of orchestration campaign records.
#[async_trait]
pub trait OrchestrationStore: Send + Sync {
    async fn get_by_id(&self, orchestration_id: &str) -> Result<Orchestration, StorageError>;

    async fn list(
        &self,
        filter: &OrchestrationFilter,
    ) -> Result<Paged<Orchestration>, StorageError>;

    async fn update_state(
        &self,
        orchestration_id: &str,
        state: OrchestrationState,
    ) -> Result<(), StorageError>;
}

/// Persistence of runtime operations, partitioned by orchestration kind.
#[async_trait]
pub trait OperationStore: Send + Sync {
    async fn get_by_id(
        &self,
        kind: OrchestrationKind,
        operation_id: &str,
    ) -> Result<RuntimeOperation, StorageError>;

    async fn list_by_orchestration(
        &self,
        kind: OrchestrationKind,
        orchestration_id: &str,
        filter: &OperationFilter,
    ) -> Result<Paged<RuntimeOperation>, StorageError>;

    async fn update_state(
        &self,
        kind: OrchestrationKind,
        operation_id: &str,
        state: OperationState,
    ) -> Result<(), StorageError>;

    async fn stats_for_orchestration(
        &self,
        kind: OrchestrationKind,
        orchestration_id: &str,
    ) -> Result<OperationStats, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_filter_matches_the_state_predicate() {
        let filter = OperationFilter::retriable();
        for state in OperationState::ALL {
            assert_eq!(filter.states.contains(&state), state.is_retriable());
        }
    }
}
