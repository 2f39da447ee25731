//! Configurable mock operation executor shared by the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use fleet_upgrade_core::{ExecutorError, OperationExecutor};

type BehaviorFn =
    dyn Fn(&str, usize) -> Result<Option<Duration>, ExecutorError> + Send + Sync;

/// One recorded `execute` invocation.
#[derive(Debug, Clone)]
pub struct ExecuteCall {
    pub operation_id: String,
    pub at: Instant,
}

/// Mock executor with per-attempt behavior, simulated work time, recorded
/// calls, and injectable reschedule failures.
pub struct MockExecutor {
    calls: Mutex<Vec<ExecuteCall>>,
    attempts: Mutex<HashMap<String, usize>>,
    reschedules: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
    reschedule_attempts: AtomicUsize,
    reschedule_failures_left: AtomicUsize,
    execute_delay: Duration,
    behavior: Box<BehaviorFn>,
}

impl MockExecutor {
    /// An executor that finishes every attempt immediately.
    pub fn new() -> Self {
        Self::with_behavior(|_, _| Ok(None))
    }

    /// Behavior receives `(operation_id, attempt)` with attempts 1-indexed.
    pub fn with_behavior<F>(behavior: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Option<Duration>, ExecutorError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            reschedules: Mutex::new(Vec::new()),
            reschedule_attempts: AtomicUsize::new(0),
            reschedule_failures_left: AtomicUsize::new(0),
            execute_delay: Duration::ZERO,
            behavior: Box::new(behavior),
        }
    }

    /// Simulate each attempt taking this long.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = delay;
        self
    }

    /// Make the next `n` reschedule calls fail.
    pub fn fail_next_reschedules(self, n: usize) -> Self {
        self.reschedule_failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<ExecuteCall> {
        self.calls.lock().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_count(&self, operation_id: &str) -> usize {
        self.attempts
            .lock()
            .get(operation_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn reschedules(&self) -> Vec<(String, DateTime<Utc>, DateTime<Utc>)> {
        self.reschedules.lock().clone()
    }

    /// Number of reschedule calls made, including failed ones.
    pub fn reschedule_attempts(&self) -> usize {
        self.reschedule_attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationExecutor for MockExecutor {
    async fn execute(&self, operation_id: &str) -> Result<Option<Duration>, ExecutorError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let count = attempts.entry(operation_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        self.calls.lock().push(ExecuteCall {
            operation_id: operation_id.to_string(),
            at: Instant::now(),
        });
        if !self.execute_delay.is_zero() {
            tokio::time::sleep(self.execute_delay).await;
        }
        (self.behavior)(operation_id, attempt)
    }

    async fn reschedule(
        &self,
        operation_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), ExecutorError> {
        self.reschedule_attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.reschedule_failures_left.load(Ordering::SeqCst);
        if left > 0
            && self
                .reschedule_failures_left
                .compare_exchange(left, left - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(ExecutorError::new("injected reschedule failure"));
        }
        self.reschedules
            .lock()
            .push((operation_id.to_string(), begin, end));
        Ok(())
    }
}
