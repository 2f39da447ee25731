use serde::{Deserialize, Serialize};
use std::fmt;

/// When operations of an orchestration are allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Execute as soon as a worker is available.
    Immediate,
    /// Defer each operation to its runtime's maintenance window.
    MaintenanceWindow,
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::MaintenanceWindow => write!(f, "maintenance_window"),
        }
    }
}

/// Parallelism bounds for one orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelSpec {
    /// Upper bound on concurrent operation executions for this orchestration.
    pub workers: usize,
}

/// The runtime policy of an orchestration: when operations run and how many
/// may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub schedule: ScheduleKind,
    pub parallel: ParallelSpec,
}

impl StrategySpec {
    pub fn immediate(workers: usize) -> Self {
        Self {
            schedule: ScheduleKind::Immediate,
            parallel: ParallelSpec { workers },
        }
    }

    pub fn maintenance_window(workers: usize) -> Self {
        Self {
            schedule: ScheduleKind::MaintenanceWindow,
            parallel: ParallelSpec { workers },
        }
    }

    /// A spec is well-formed when it allows at least one worker.
    pub fn validate(&self) -> Result<(), String> {
        if self.parallel.workers == 0 {
            return Err("strategy requires at least one worker".to_string());
        }
        Ok(())
    }
}

impl Default for StrategySpec {
    fn default() -> Self {
        Self::immediate(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_zero_workers() {
        assert!(StrategySpec::immediate(0).validate().is_err());
        assert!(StrategySpec::immediate(1).validate().is_ok());
        assert!(StrategySpec::maintenance_window(8).validate().is_ok());
    }

    #[test]
    fn schedule_serde() {
        let json = serde_json::to_string(&ScheduleKind::MaintenanceWindow).unwrap();
        assert_eq!(json, "\"maintenance_window\"");
    }
}
