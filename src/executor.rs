//! # Operation Executor Capability
//!
//! The strategy engine treats "upgrade one runtime" as a black box behind
//! this trait. An attempt either finishes (successfully or with a terminal
//! error) or asks to be called again after a delay; the engine owns all
//! scheduling around it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Failure reported by the executor for one operation attempt or for a
/// maintenance-window reschedule.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ExecutorError(pub String);

impl ExecutorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Carries out one operation attempt and persists window reschedules.
///
/// Implementations are responsible for their own idempotence; the engine may
/// call [`execute`](OperationExecutor::execute) again for the same operation
/// after a crash or when the executor itself asked for a deferred
/// continuation.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Perform one attempt.
    ///
    /// `Ok(Some(delay))` means "call me again after `delay`"; the engine
    /// re-enqueues the operation without treating it as finished. `Ok(None)`
    /// and `Err(_)` both finish the operation for scheduling purposes.
    async fn execute(&self, operation_id: &str) -> Result<Option<Duration>, ExecutorError>;

    /// Persist an updated maintenance window for the operation.
    async fn reschedule(
        &self,
        operation_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), ExecutorError>;
}
