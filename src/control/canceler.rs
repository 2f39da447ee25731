//! # Canceler
//!
//! Marks an orchestration as cancelling in storage and signals the running
//! strategy execution to stop taking new work. If nothing is running,
//! persisting the state is sufficient; a later restart honors it.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::model::{OrchestrationKind, OrchestrationState};
use crate::storage::OrchestrationStore;
use crate::strategy::ParallelStrategy;

pub struct Canceler {
    orchestrations: Arc<dyn OrchestrationStore>,
    kyma_strategy: Arc<ParallelStrategy>,
    cluster_strategy: Arc<ParallelStrategy>,
}

impl Canceler {
    pub fn new(
        orchestrations: Arc<dyn OrchestrationStore>,
        kyma_strategy: Arc<ParallelStrategy>,
        cluster_strategy: Arc<ParallelStrategy>,
    ) -> Self {
        Self {
            orchestrations,
            kyma_strategy,
            cluster_strategy,
        }
    }

    fn strategy_for(&self, kind: OrchestrationKind) -> &Arc<ParallelStrategy> {
        match kind {
            OrchestrationKind::UpgradeKyma => &self.kyma_strategy,
            OrchestrationKind::UpgradeCluster => &self.cluster_strategy,
        }
    }

    /// Cancel an orchestration by ID. Idempotent: an orchestration that is
    /// already canceling or terminal succeeds without touching anything.
    pub async fn cancel_for_id(&self, orchestration_id: &str) -> Result<()> {
        let orchestration = self.orchestrations.get_by_id(orchestration_id).await?;
        if !orchestration.state.can_cancel() {
            info!(
                orchestration_id = %orchestration_id,
                state = %orchestration.state,
                "orchestration already canceling or finished, nothing to cancel"
            );
            return Ok(());
        }

        self.orchestrations
            .update_state(orchestration_id, OrchestrationState::Canceling)
            .await?;

        if let Some(handle) = self
            .strategy_for(orchestration.kind)
            .execution_for(orchestration_id)
            .await
        {
            info!(
                orchestration_id = %orchestration_id,
                execution_id = %handle.execution_id(),
                "signalling running execution to cancel"
            );
            handle.cancel();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    use crate::config::OrchestratorConfig;
    use crate::error::OrchestratorError;
    use crate::executor::{ExecutorError, OperationExecutor};
    use crate::model::{Orchestration, StrategySpec};
    use crate::storage::InMemoryStore;

    struct NoopExecutor;

    #[async_trait]
    impl OperationExecutor for NoopExecutor {
        async fn execute(
            &self,
            _operation_id: &str,
        ) -> std::result::Result<Option<Duration>, ExecutorError> {
            Ok(None)
        }

        async fn reschedule(
            &self,
            _operation_id: &str,
            _begin: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> std::result::Result<(), ExecutorError> {
            Ok(())
        }
    }

    fn canceler(store: &InMemoryStore) -> Canceler {
        let config = OrchestratorConfig::default();
        Canceler::new(
            Arc::new(store.clone()),
            Arc::new(ParallelStrategy::new(Arc::new(NoopExecutor), &config)),
            Arc::new(ParallelStrategy::new(Arc::new(NoopExecutor), &config)),
        )
    }

    async fn seed(store: &InMemoryStore, id: &str, state: OrchestrationState) {
        let mut o = Orchestration::new(id, OrchestrationKind::UpgradeKyma, StrategySpec::immediate(1));
        o.state = state;
        store.insert_orchestration(o).await;
    }

    #[tokio::test]
    async fn unknown_orchestration_is_not_found() {
        let store = InMemoryStore::new();
        let err = canceler(&store)
            .cancel_for_id("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_marks_orchestration_canceling() {
        let store = InMemoryStore::new();
        seed(&store, "orch-1", OrchestrationState::InProgress).await;

        canceler(&store).cancel_for_id("orch-1").await.unwrap();

        let orchestration = store.get_by_id("orch-1").await.unwrap();
        assert_eq!(orchestration.state, OrchestrationState::Canceling);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let store = InMemoryStore::new();
        seed(&store, "orch-1", OrchestrationState::InProgress).await;
        let canceler = canceler(&store);

        canceler.cancel_for_id("orch-1").await.unwrap();
        let first = store.get_by_id("orch-1").await.unwrap();
        assert_eq!(first.state, OrchestrationState::Canceling);

        // The second cancel short-circuits: nothing is re-persisted.
        canceler.cancel_for_id("orch-1").await.unwrap();
        let second = store.get_by_id("orch-1").await.unwrap();
        assert_eq!(second.state, OrchestrationState::Canceling);
        assert_eq!(second.updated_at, first.updated_at);
    }

    #[tokio::test]
    async fn terminal_orchestrations_are_left_alone() {
        let store = InMemoryStore::new();
        seed(&store, "orch-1", OrchestrationState::Succeeded).await;

        canceler(&store).cancel_for_id("orch-1").await.unwrap();
        assert_eq!(
            store.get_by_id("orch-1").await.unwrap().state,
            OrchestrationState::Succeeded
        );
    }
}
