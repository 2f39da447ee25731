//! # Parallel Orchestration Strategy
//!
//! Executes the operations of one orchestration in parallel using a pool of
//! workers over a delaying queue. Each call to
//! [`execute`](ParallelStrategy::execute) creates a self-contained
//! *execution*: a dedicated queue, an outstanding-operation counter, and a
//! worker pool tracked by a [`TaskTracker`]. The strategy keeps a registry of
//! live executions so the retry and cancel control paths can reach a running
//! execution through an [`ExecutionHandle`].
//!
//! Cancellation is cooperative at the queue boundary: cancelling shuts the
//! execution's queue down, workers exit on their next dequeue, and operations
//! already handed to the executor run to completion.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::delay_queue::{DelayQueue, Keyed};
use super::maintenance::update_maintenance_window;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::executor::OperationExecutor;
use crate::model::{RuntimeOperation, ScheduleKind, StrategySpec};

impl Keyed for RuntimeOperation {
    fn key(&self) -> &str {
        &self.operation_id
    }
}

/// One in-memory run of the strategy over a set of operations.
struct Execution {
    execution_id: String,
    orchestration_id: String,
    queue: Arc<DelayQueue<RuntimeOperation>>,
    /// Operations not yet finished for scheduling purposes. Reaches zero
    /// when the execution drains; workers then shut the queue down and exit.
    outstanding: AtomicI64,
    tracker: TaskTracker,
}

/// Cloneable handle onto a live execution.
///
/// The retryer uses [`enqueue`](ExecutionHandle::enqueue) to re-enter the
/// execution's queue from outside the worker loop; `cancel` and `wait` mirror
/// the strategy-level entry points.
#[derive(Clone)]
pub struct ExecutionHandle {
    execution: Arc<Execution>,
}

impl ExecutionHandle {
    pub fn execution_id(&self) -> &str {
        &self.execution.execution_id
    }

    pub fn orchestration_id(&self) -> &str {
        &self.execution.orchestration_id
    }

    /// Add an operation to the running execution, growing its outstanding
    /// count. Returns `false` without enqueuing once the execution is
    /// shutting down.
    pub fn enqueue(&self, operation: RuntimeOperation) -> bool {
        if self.execution.queue.shutting_down() {
            return false;
        }
        self.execution.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.execution.queue.add_after(operation, Duration::ZERO) {
            true
        } else {
            // Shutdown raced the check; undo the reservation.
            self.execution.outstanding.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    pub fn cancel(&self) {
        self.execution.queue.shut_down();
    }

    pub async fn wait(&self) {
        self.execution.tracker.wait().await;
    }

    /// Observed outstanding-operation count.
    pub fn outstanding(&self) -> i64 {
        self.execution.outstanding.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Registry {
    executions: HashMap<String, Arc<Execution>>,
    /// Latest execution started for each orchestration.
    by_orchestration: HashMap<String, String>,
}

/// Worker-pool scheduler driving operations through maintenance-window
/// policy and the operation executor.
pub struct ParallelStrategy {
    executor: Arc<dyn OperationExecutor>,
    reschedule_delay: Duration,
    reschedule_error_delay: Duration,
    registry: RwLock<Registry>,
}

impl ParallelStrategy {
    pub fn new(executor: Arc<dyn OperationExecutor>, config: &OrchestratorConfig) -> Self {
        Self {
            executor,
            reschedule_delay: config.reschedule_delay,
            reschedule_error_delay: config.reschedule_error_delay,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Start the parallel execution of `operations` under `spec`.
    ///
    /// Returns `Ok(None)` for an empty operation set, creating no resources.
    /// Otherwise returns the fresh execution ID without blocking on
    /// completion; callers observe progress through
    /// [`wait`](Self::wait). Validation failures return an error with
    /// nothing enqueued; per-operation scheduling failures are absorbed by
    /// the reschedule-error policy so the returned execution always covers
    /// every supplied operation.
    pub async fn execute(
        &self,
        operations: Vec<RuntimeOperation>,
        spec: &StrategySpec,
    ) -> Result<Option<String>> {
        if operations.is_empty() {
            return Ok(None);
        }
        spec.validate().map_err(OrchestratorError::BadRequest)?;
        validate_operations(&operations, spec)?;

        let execution_id = Uuid::new_v4().to_string();
        let orchestration_id = operations[0].orchestration_id.clone();
        let execution = Arc::new(Execution {
            execution_id: execution_id.clone(),
            orchestration_id: orchestration_id.clone(),
            queue: Arc::new(DelayQueue::new()),
            outstanding: AtomicI64::new(operations.len() as i64),
            tracker: TaskTracker::new(),
        });

        {
            let mut registry = self.registry.write().await;
            registry
                .executions
                .insert(execution_id.clone(), Arc::clone(&execution));
            registry
                .by_orchestration
                .insert(orchestration_id, execution_id.clone());
        }

        let total = operations.len();
        for mut op in operations {
            match update_maintenance_window(
                &mut op,
                spec.schedule,
                self.reschedule_delay,
                self.executor.as_ref(),
            )
            .await
            {
                Ok(delay) => {
                    execution
                        .queue
                        .add_after(op, delay.to_std().unwrap_or(Duration::ZERO));
                }
                Err(err) => {
                    warn!(
                        operation_id = %op.operation_id,
                        error = %err,
                        "scheduling operation failed, backing off before reprocessing"
                    );
                    execution.queue.add_after(op, self.reschedule_error_delay);
                }
            }
        }

        for _ in 0..spec.parallel.workers {
            execution.tracker.spawn(worker_loop(
                Arc::clone(&execution),
                Arc::clone(&self.executor),
                spec.schedule,
                self.reschedule_delay,
                self.reschedule_error_delay,
            ));
        }
        execution.tracker.close();

        info!(
            execution_id = %execution_id,
            workers = spec.parallel.workers,
            operations = total,
            "started parallel execution"
        );
        Ok(Some(execution_id))
    }

    /// Block until all workers of the execution have exited. Unknown IDs
    /// return immediately.
    pub async fn wait(&self, execution_id: &str) {
        let execution = {
            let registry = self.registry.read().await;
            registry.executions.get(execution_id).cloned()
        };
        if let Some(execution) = execution {
            execution.tracker.wait().await;
        }
    }

    /// Stop the execution at the queue boundary: workers exit on their next
    /// dequeue while in-flight executor calls run to completion. Idempotent;
    /// unknown or empty IDs are no-ops.
    pub async fn cancel(&self, execution_id: &str) {
        if execution_id.is_empty() {
            return;
        }
        let execution = {
            let registry = self.registry.read().await;
            registry.executions.get(execution_id).cloned()
        };
        if let Some(execution) = execution {
            info!(execution_id = %execution_id, "cancelling strategy execution");
            execution.queue.shut_down();
        }
    }

    /// Handle onto a live execution by execution ID.
    pub async fn handle(&self, execution_id: &str) -> Option<ExecutionHandle> {
        let registry = self.registry.read().await;
        registry
            .executions
            .get(execution_id)
            .cloned()
            .map(|execution| ExecutionHandle { execution })
    }

    /// Handle onto the latest execution registered for an orchestration.
    pub async fn execution_for(&self, orchestration_id: &str) -> Option<ExecutionHandle> {
        let registry = self.registry.read().await;
        registry
            .by_orchestration
            .get(orchestration_id)
            .and_then(|execution_id| registry.executions.get(execution_id))
            .cloned()
            .map(|execution| ExecutionHandle { execution })
    }

    /// Drop a finished execution's in-memory resources. This is the explicit
    /// cleanup point; until it is called, post-hoc `wait` and `cancel` keep
    /// working.
    pub async fn remove(&self, execution_id: &str) {
        let mut registry = self.registry.write().await;
        if let Some(execution) = registry.executions.remove(execution_id) {
            let orchestration_id = execution.orchestration_id.clone();
            if registry.by_orchestration.get(&orchestration_id)
                == Some(&execution.execution_id)
            {
                registry.by_orchestration.remove(&orchestration_id);
            }
        }
    }
}

fn validate_operations(
    operations: &[RuntimeOperation],
    spec: &StrategySpec,
) -> Result<()> {
    for op in operations {
        if !op.window_is_valid() {
            return Err(OrchestratorError::BadRequest(format!(
                "operation {}: maintenance window begins after it ends",
                op.operation_id
            )));
        }
        if spec.schedule == ScheduleKind::MaintenanceWindow
            && op.maintenance_window_end.is_some()
        {
            if op.maintenance_window_begin.is_none() {
                return Err(OrchestratorError::BadRequest(format!(
                    "operation {}: maintenance window end without begin",
                    op.operation_id
                )));
            }
            if op.maintenance_days.is_empty() {
                return Err(OrchestratorError::BadRequest(format!(
                    "operation {}: maintenance days must not be empty",
                    op.operation_id
                )));
            }
        }
    }
    Ok(())
}

async fn worker_loop(
    execution: Arc<Execution>,
    executor: Arc<dyn OperationExecutor>,
    schedule: ScheduleKind,
    reschedule_delay: Duration,
    reschedule_error_delay: Duration,
) {
    loop {
        if execution.outstanding.load(Ordering::SeqCst) <= 0 {
            execution.queue.shut_down();
            break;
        }
        if execution.queue.shutting_down() {
            break;
        }

        let Some(mut op) = execution.queue.get().await else {
            debug!(execution_id = %execution.execution_id, "delay queue shut down");
            break;
        };

        // The window may have expired while the operation sat in the queue.
        let delay = match update_maintenance_window(
            &mut op,
            schedule,
            reschedule_delay,
            executor.as_ref(),
        )
        .await
        {
            Ok(delay) => delay,
            Err(err) => {
                warn!(
                    operation_id = %op.operation_id,
                    error = %err,
                    "rescheduling operation failed, backing off before reprocessing"
                );
                let key = op.operation_id.clone();
                execution.queue.add_after(op, reschedule_error_delay);
                execution.queue.done(&key);
                continue;
            }
        };

        if delay <= chrono::Duration::zero() {
            debug!(operation_id = %op.operation_id, "operation is scheduled now");
            process_operation(&execution, op, &executor).await;
        } else {
            debug!(
                operation_id = %op.operation_id,
                delay_seconds = delay.num_seconds(),
                "operation deferred until its maintenance window"
            );
            let key = op.operation_id.clone();
            execution
                .queue
                .add_after(op, delay.to_std().unwrap_or(Duration::ZERO));
            execution.queue.done(&key);
        }
    }
}

/// Run one executor attempt and settle the operation's accounting.
///
/// The executor call runs in its own task so that a panic is trapped at the
/// join boundary instead of taking the worker pool down; a trapped panic is
/// logged and treated as a terminal error. A deferred-retry answer re-enqueues
/// the operation without touching the outstanding count; every other outcome
/// decrements it exactly once.
async fn process_operation(
    execution: &Execution,
    op: RuntimeOperation,
    executor: &Arc<dyn OperationExecutor>,
) {
    let operation_id = op.operation_id.clone();

    let attempt = {
        let executor = Arc::clone(executor);
        let id = operation_id.clone();
        tokio::spawn(async move { executor.execute(&id).await })
    };

    match attempt.await {
        Ok(Ok(Some(retry_after))) => {
            debug!(
                operation_id = %operation_id,
                retry_after_seconds = retry_after.as_secs(),
                "executor requested a deferred continuation"
            );
            execution.queue.add_after(op, retry_after);
            execution.queue.done(&operation_id);
            return;
        }
        Ok(Ok(None)) => {}
        Ok(Err(err)) => {
            error!(operation_id = %operation_id, error = %err, "operation execution failed");
        }
        Err(join_err) => {
            if join_err.is_panic() {
                error!(
                    operation_id = %operation_id,
                    panic = %panic_message(join_err.into_panic()),
                    "executor panicked while processing operation"
                );
            } else {
                error!(operation_id = %operation_id, "executor task was aborted");
            }
        }
    }

    execution.outstanding.fetch_sub(1, Ordering::SeqCst);
    execution.queue.done(&operation_id);
    debug!(operation_id = %operation_id, "finished processing operation");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
