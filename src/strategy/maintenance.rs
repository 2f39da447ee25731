//! Maintenance-window evaluation.
//!
//! Decides when an operation may run under the orchestration's schedule, and
//! moves elapsed windows forward (persisting the move through the executor)
//! so a missed window is retried in the next one rather than dropped.

use chrono::{Datelike, Duration, Utc, Weekday};
use std::time::Duration as StdDuration;

use crate::executor::{ExecutorError, OperationExecutor};
use crate::model::{RuntimeOperation, ScheduleKind};

/// Evaluate the schedule for one operation, returning how long to wait
/// before executing it. A result ≤ 0 means "due now".
///
/// When the operation's window has already elapsed, both endpoints are
/// shifted forward — by `reschedule_delay` when it is non-zero, otherwise to
/// the next weekday allowed by the operation's maintenance days — and the
/// moved window is persisted via [`OperationExecutor::reschedule`]. A
/// persistence failure propagates unchanged; the caller applies the
/// reschedule-error policy.
pub(crate) async fn update_maintenance_window(
    op: &mut RuntimeOperation,
    schedule: ScheduleKind,
    reschedule_delay: StdDuration,
    executor: &dyn OperationExecutor,
) -> Result<Duration, ExecutorError> {
    match schedule {
        ScheduleKind::Immediate => Ok(Duration::zero()),
        ScheduleKind::MaintenanceWindow => {
            let now = Utc::now();
            if let (Some(begin), Some(end)) =
                (op.maintenance_window_begin, op.maintenance_window_end)
            {
                // Window elapsed without execution: requeue into the next one.
                if end < now {
                    let shift = if reschedule_delay.is_zero() {
                        let diff = next_available_day_diff(begin.weekday(), &op.maintenance_days);
                        Duration::days(diff)
                    } else {
                        Duration::from_std(reschedule_delay).map_err(|e| {
                            ExecutorError::new(format!("reschedule delay out of range: {e}"))
                        })?
                    };
                    let new_begin = begin + shift;
                    let new_end = end + shift;
                    op.maintenance_window_begin = Some(new_begin);
                    op.maintenance_window_end = Some(new_end);
                    executor
                        .reschedule(&op.operation_id, new_begin, new_end)
                        .await?;
                }
            }
            Ok(op
                .maintenance_window_begin
                .map(|begin| begin - now)
                .unwrap_or_else(Duration::zero))
        }
    }
}

/// Smallest positive day offset from `current` landing on a weekday in
/// `days`. With `days` containing only `current`, that is a full week.
///
/// Callers must reject empty `days` at submission time; this function falls
/// back to a one-week shift for them.
pub(crate) fn next_available_day_diff(current: Weekday, days: &[Weekday]) -> i64 {
    let mut candidate = current;
    for offset in 1..=7 {
        candidate = candidate.succ();
        if days.contains(&candidate) {
            return offset;
        }
    }
    7
}
