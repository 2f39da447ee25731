//! In-memory storage used by tests and database-less embedders.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    OperationFilter, OperationStats, OperationStore, OrchestrationFilter, OrchestrationStore,
    Page, Paged, StorageError,
};
use crate::model::{
    Orchestration, OrchestrationKind, OrchestrationState, OperationState, RuntimeOperation,
};

/// Thread-safe in-memory store implementing both storage traits.
///
/// Operations live in per-kind tables, mirroring the split the durable
/// backend keeps between campaign kinds.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    orchestrations: Arc<RwLock<HashMap<String, Orchestration>>>,
    operations: Arc<RwLock<HashMap<OrchestrationKind, HashMap<String, RuntimeOperation>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_orchestration(&self, orchestration: Orchestration) {
        let mut orchestrations = self.orchestrations.write().await;
        orchestrations.insert(orchestration.orchestration_id.clone(), orchestration);
    }

    pub async fn insert_operation(&self, kind: OrchestrationKind, operation: RuntimeOperation) {
        let mut operations = self.operations.write().await;
        operations
            .entry(kind)
            .or_default()
            .insert(operation.operation_id.clone(), operation);
    }
}

fn paginate<T: Clone>(mut items: Vec<T>, page: Option<Page>) -> Paged<T> {
    let total_count = items.len();
    if let Some(page) = page {
        let start = (page.page.saturating_sub(1) as usize) * page.page_size as usize;
        items = items
            .into_iter()
            .skip(start)
            .take(page.page_size as usize)
            .collect();
    }
    Paged {
        count: items.len(),
        total_count,
        items,
    }
}

#[async_trait]
impl OrchestrationStore for InMemoryStore {
    async fn get_by_id(&self, orchestration_id: &str) -> Result<Orchestration, StorageError> {
        let orchestrations = self.orchestrations.read().await;
        orchestrations
            .get(orchestration_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("orchestration", orchestration_id))
    }

    async fn list(
        &self,
        filter: &OrchestrationFilter,
    ) -> Result<Paged<Orchestration>, StorageError> {
        let orchestrations = self.orchestrations.read().await;
        let mut matching: Vec<Orchestration> = orchestrations
            .values()
            .filter(|o| filter.states.is_empty() || filter.states.contains(&o.state))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(matching, filter.page))
    }

    async fn update_state(
        &self,
        orchestration_id: &str,
        state: OrchestrationState,
    ) -> Result<(), StorageError> {
        let mut orchestrations = self.orchestrations.write().await;
        let orchestration = orchestrations
            .get_mut(orchestration_id)
            .ok_or_else(|| StorageError::not_found("orchestration", orchestration_id))?;
        orchestration.state = state;
        orchestration.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OperationStore for InMemoryStore {
    async fn get_by_id(
        &self,
        kind: OrchestrationKind,
        operation_id: &str,
    ) -> Result<RuntimeOperation, StorageError> {
        let operations = self.operations.read().await;
        operations
            .get(&kind)
            .and_then(|table| table.get(operation_id))
            .cloned()
            .ok_or_else(|| StorageError::not_found("operation", operation_id))
    }

    async fn list_by_orchestration(
        &self,
        kind: OrchestrationKind,
        orchestration_id: &str,
        filter: &OperationFilter,
    ) -> Result<Paged<RuntimeOperation>, StorageError> {
        let operations = self.operations.read().await;
        let mut matching: Vec<RuntimeOperation> = operations
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|op| op.orchestration_id == orchestration_id)
                    .filter(|op| filter.states.is_empty() || filter.states.contains(&op.state))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        Ok(paginate(matching, filter.page))
    }

    async fn update_state(
        &self,
        kind: OrchestrationKind,
        operation_id: &str,
        state: OperationState,
    ) -> Result<(), StorageError> {
        let mut operations = self.operations.write().await;
        let operation = operations
            .get_mut(&kind)
            .and_then(|table| table.get_mut(operation_id))
            .ok_or_else(|| StorageError::not_found("operation", operation_id))?;
        operation.state = state;
        operation.updated_at = Utc::now();
        Ok(())
    }

    async fn stats_for_orchestration(
        &self,
        kind: OrchestrationKind,
        orchestration_id: &str,
    ) -> Result<OperationStats, StorageError> {
        let operations = self.operations.read().await;
        let mut stats = OperationStats::default();
        if let Some(table) = operations.get(&kind) {
            for op in table.values() {
                if op.orchestration_id == orchestration_id {
                    stats.record(op.state);
                }
            }
        }
        Ok(stats)
    }
}
