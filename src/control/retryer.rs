//! # Retryer
//!
//! Validates a caller-supplied subset of operation IDs against the current
//! orchestration state and re-enqueues the eligible ones onto the running
//! execution of the orchestration's strategy. Only this component re-enters
//! an execution's queue from outside the worker loop, and it does so through
//! an explicit [`ExecutionHandle`] resolved by orchestration kind.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{OperationState, OrchestrationKind};
use crate::storage::{OperationFilter, OperationStore, OrchestrationStore};
use crate::strategy::ParallelStrategy;

/// Outcome of a retry request: which operations were accepted, which were
/// rejected and why.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetryResponse {
    pub orchestration_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedOperation>,
    pub msg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedOperation {
    pub operation_id: String,
    pub reason: String,
}

pub struct Retryer {
    orchestrations: Arc<dyn OrchestrationStore>,
    operations: Arc<dyn OperationStore>,
    kyma_strategy: Arc<ParallelStrategy>,
    cluster_strategy: Arc<ParallelStrategy>,
}

impl Retryer {
    pub fn new(
        orchestrations: Arc<dyn OrchestrationStore>,
        operations: Arc<dyn OperationStore>,
        kyma_strategy: Arc<ParallelStrategy>,
        cluster_strategy: Arc<ParallelStrategy>,
    ) -> Self {
        Self {
            orchestrations,
            operations,
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

    /// Retry the given operations of an orchestration. An empty `operation_ids`
    /// list means "all retriable operations".
    ///
    /// Accepted operations are reset to [`OperationState::Retrying`] in
    /// storage so the executor treats them as fresh, then enqueued onto the
    /// orchestration's running execution when one is live. An empty accepted
    /// list is a success carrying an informational message, not an error.
    pub async fn retry(
        &self,
        orchestration_id: &str,
        operation_ids: &[String],
    ) -> Result<RetryResponse> {
        let orchestration = self.orchestrations.get_by_id(orchestration_id).await?;
        let kind = orchestration.kind;

        let candidates = self
            .operations
            .list_by_orchestration(kind, orchestration_id, &OperationFilter::retriable())
            .await?;

        let targets: Vec<String> = if operation_ids.is_empty() {
            candidates
                .items
                .iter()
                .map(|op| op.operation_id.clone())
                .collect()
        } else {
            operation_ids.to_vec()
        };

        let handle = self.strategy_for(kind).execution_for(orchestration_id).await;

        let mut response = RetryResponse {
            orchestration_id: orchestration_id.to_string(),
            ..RetryResponse::default()
        };

        for target in targets {
            let Some(candidate) = candidates
                .items
                .iter()
                .find(|op| op.operation_id == target)
            else {
                let reason = self.rejection_reason(kind, orchestration_id, &target).await;
                response.rejected.push(RejectedOperation {
                    operation_id: target,
                    reason,
                });
                continue;
            };

            if let Err(err) = self
                .operations
                .update_state(kind, &target, OperationState::Retrying)
                .await
            {
                warn!(
                    operation_id = %target,
                    error = %err,
                    "failed to persist retry state, skipping operation"
                );
                response.rejected.push(RejectedOperation {
                    operation_id: target,
                    reason: "failed to persist retry state".to_string(),
                });
                continue;
            }

            let mut operation = candidate.clone();
            operation.state = OperationState::Retrying;
            if let Some(handle) = &handle {
                if !handle.enqueue(operation) {
                    warn!(
                        operation_id = %target,
                        execution_id = %handle.execution_id(),
                        "running execution is shutting down, retry deferred to restart"
                    );
                }
            }
            response.accepted.push(target);
        }

        response.msg = if response.accepted.is_empty() {
            info!(orchestration_id = %orchestration_id, "no valid operations to retry");
            "no operations accepted for retry".to_string()
        } else if handle.is_some() {
            "retry operations are queued for processing".to_string()
        } else {
            "retry operations will be processed when the orchestration resumes".to_string()
        };

        Ok(response)
    }

    /// Explain why an operation outside the candidate set cannot be retried.
    async fn rejection_reason(
        &self,
        kind: OrchestrationKind,
        orchestration_id: &str,
        operation_id: &str,
    ) -> String {
        match self.operations.get_by_id(kind, operation_id).await {
            Ok(op) if op.orchestration_id != orchestration_id => {
                "belongs to another orchestration".to_string()
            }
            Ok(op) => format!("not in a retriable state: {}", op.state),
            Err(err) if err.is_not_found() => "not found".to_string(),
            Err(err) => format!("storage error: {err}"),
        }
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
    use crate::model::{Orchestration, RuntimeOperation, StrategySpec};
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

    struct Fixture {
        store: InMemoryStore,
        retryer: Retryer,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let config = OrchestratorConfig::default();
        let kyma = Arc::new(ParallelStrategy::new(Arc::new(NoopExecutor), &config));
        let cluster = Arc::new(ParallelStrategy::new(Arc::new(NoopExecutor), &config));
        let retryer = Retryer::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            kyma,
            cluster,
        );
        Fixture { store, retryer }
    }

    async fn seed_orchestration(store: &InMemoryStore, id: &str) {
        store
            .insert_orchestration(Orchestration::new(
                id,
                OrchestrationKind::UpgradeKyma,
                StrategySpec::immediate(2),
            ))
            .await;
    }

    async fn seed_operation(store: &InMemoryStore, id: &str, orch: &str, state: OperationState) {
        let mut op = RuntimeOperation::new(id, orch, "rt");
        op.state = state;
        store
            .insert_operation(OrchestrationKind::UpgradeKyma, op)
            .await;
    }

    #[tokio::test]
    async fn unknown_orchestration_is_not_found() {
        let f = fixture();
        let err = f.retryer.retry("missing", &[]).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn named_failed_operations_are_accepted() {
        let f = fixture();
        seed_orchestration(&f.store, "orch-1").await;
        seed_operation(&f.store, "op-1", "orch-1", OperationState::Failed).await;
        seed_operation(&f.store, "op-2", "orch-1", OperationState::Failed).await;
        seed_operation(&f.store, "op-3", "orch-1", OperationState::Failed).await;

        let response = f
            .retryer
            .retry("orch-1", &["op-1".to_string(), "op-2".to_string()])
            .await
            .unwrap();

        assert_eq!(response.accepted, vec!["op-1", "op-2"]);
        assert!(response.rejected.is_empty());

        // The accepted operations were reset; the unnamed one was left alone.
        let op = crate::storage::OperationStore::get_by_id(
            &f.store,
            OrchestrationKind::UpgradeKyma,
            "op-1",
        )
        .await
        .unwrap();
        assert_eq!(op.state, OperationState::Retrying);
        let untouched = crate::storage::OperationStore::get_by_id(
            &f.store,
            OrchestrationKind::UpgradeKyma,
            "op-3",
        )
        .await
        .unwrap();
        assert_eq!(untouched.state, OperationState::Failed);
    }

    #[tokio::test]
    async fn empty_request_means_all_candidates() {
        let f = fixture();
        seed_orchestration(&f.store, "orch-1").await;
        seed_operation(&f.store, "op-1", "orch-1", OperationState::Failed).await;
        seed_operation(&f.store, "op-2", "orch-1", OperationState::InProgress).await;
        seed_operation(&f.store, "op-3", "orch-1", OperationState::Succeeded).await;

        let mut response = f.retryer.retry("orch-1", &[]).await.unwrap();
        response.accepted.sort();
        assert_eq!(response.accepted, vec!["op-1", "op-2"]);
    }

    #[tokio::test]
    async fn rejections_carry_reasons() {
        let f = fixture();
        seed_orchestration(&f.store, "orch-1").await;
        seed_orchestration(&f.store, "orch-2").await;
        seed_operation(&f.store, "op-done", "orch-1", OperationState::Succeeded).await;
        seed_operation(&f.store, "op-other", "orch-2", OperationState::Failed).await;

        let response = f
            .retryer
            .retry(
                "orch-1",
                &[
                    "op-done".to_string(),
                    "op-other".to_string(),
                    "op-missing".to_string(),
                ],
            )
            .await
            .unwrap();

        assert!(response.accepted.is_empty());
        assert_eq!(response.rejected.len(), 3);
        let reason_of = |id: &str| {
            response
                .rejected
                .iter()
                .find(|r| r.operation_id == id)
                .map(|r| r.reason.clone())
                .unwrap()
        };
        assert!(reason_of("op-done").contains("not in a retriable state"));
        assert_eq!(reason_of("op-other"), "belongs to another orchestration");
        assert_eq!(reason_of("op-missing"), "not found");
        assert_eq!(response.msg, "no operations accepted for retry");
    }

    #[tokio::test]
    async fn retrying_a_retrying_operation_is_rejected() {
        let f = fixture();
        seed_orchestration(&f.store, "orch-1").await;
        seed_operation(&f.store, "op-1", "orch-1", OperationState::Retrying).await;

        let response = f
            .retryer
            .retry("orch-1", &["op-1".to_string()])
            .await
            .unwrap();
        assert!(response.accepted.is_empty());
        assert_eq!(response.rejected.len(), 1);
    }
}
