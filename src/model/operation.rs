use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single runtime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Operation is waiting to be dispatched.
    Pending,
    /// Operation is being executed against its runtime.
    InProgress,
    /// Operation finished successfully.
    Succeeded,
    /// Operation failed terminally.
    Failed,
    /// Operation was accepted for retry and will be treated as fresh.
    Retrying,
    /// Operation was cancelled before completion.
    Canceled,
}

impl OperationState {
    /// Every operation state, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::InProgress,
        Self::Succeeded,
        Self::Failed,
        Self::Retrying,
        Self::Canceled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// States eligible for the retry control path.
    ///
    /// Transitions are monotonic except `Failed | InProgress -> Retrying`.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Failed | Self::InProgress)
    }
}

impl Default for OperationState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Retrying => write!(f, "retrying"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "retrying" => Ok(Self::Retrying),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid operation state: {s}")),
        }
    }
}

/// One unit of upgrade work against one managed runtime.
///
/// The maintenance window fields drive time-based scheduling: an absent
/// window means the operation may execute at any time. `maintenance_days`
/// is the set of weekdays the window may be moved to when an elapsed window
/// is rescheduled without an explicit delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeOperation {
    pub operation_id: String,
    pub orchestration_id: String,
    pub runtime_id: String,
    pub state: OperationState,
    pub maintenance_window_begin: Option<DateTime<Utc>>,
    pub maintenance_window_end: Option<DateTime<Utc>>,
    pub maintenance_days: Vec<Weekday>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RuntimeOperation {
    pub fn new(
        operation_id: impl Into<String>,
        orchestration_id: impl Into<String>,
        runtime_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            operation_id: operation_id.into(),
            orchestration_id: orchestration_id.into(),
            runtime_id: runtime_id.into(),
            state: OperationState::Pending,
            maintenance_window_begin: None,
            maintenance_window_end: None,
            maintenance_days: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style helper used by embedders and tests.
    pub fn with_maintenance_window(
        mut self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        days: Vec<Weekday>,
    ) -> Self {
        self.maintenance_window_begin = Some(begin);
        self.maintenance_window_end = Some(end);
        self.maintenance_days = days;
        self
    }

    /// Window endpoints must be ordered when both are present.
    pub fn window_is_valid(&self) -> bool {
        match (self.maintenance_window_begin, self.maintenance_window_end) {
            (Some(begin), Some(end)) => begin <= end,
            _ => true,
        }
    }
}
