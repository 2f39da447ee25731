use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::strategy::StrategySpec;

/// The kind of campaign an orchestration runs.
///
/// The kind decides which operation table the campaign draws from and which
/// strategy instance (worker pool) processes its operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationKind {
    /// Upgrades the runtime software installed on each managed runtime.
    UpgradeKyma,
    /// Upgrades the cluster infrastructure underneath each managed runtime.
    UpgradeCluster,
}

impl fmt::Display for OrchestrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpgradeKyma => write!(f, "upgrade_kyma"),
            Self::UpgradeCluster => write!(f, "upgrade_cluster"),
        }
    }
}

impl std::str::FromStr for OrchestrationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upgrade_kyma" => Ok(Self::UpgradeKyma),
            "upgrade_cluster" => Ok(Self::UpgradeCluster),
            _ => Err(format!("Invalid orchestration kind: {s}")),
        }
    }
}

/// Lifecycle state of an orchestration campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    /// Campaign is created but no operations have been dispatched yet.
    Pending,
    /// Campaign operations are being executed.
    InProgress,
    /// All operations finished successfully.
    Succeeded,
    /// The campaign finished with at least one failed operation.
    Failed,
    /// Cancellation was requested; in-flight operations are draining.
    Canceling,
    /// The campaign was cancelled.
    Canceled,
}

impl OrchestrationState {
    /// Terminal states are sinks; no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// `Canceling` is reachable from any non-terminal state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal() && !matches!(self, Self::Canceling)
    }
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Canceling => write!(f, "canceling"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for OrchestrationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceling" => Ok(Self::Canceling),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid orchestration state: {s}")),
        }
    }
}

/// A campaign record: one fleet-wide upgrade over many runtimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orchestration {
    pub orchestration_id: String,
    pub kind: OrchestrationKind,
    pub state: OrchestrationState,
    /// Free-form operator-facing description of the campaign.
    pub description: String,
    /// Strategy governing how this campaign's operations are scheduled.
    pub strategy: StrategySpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Orchestration {
    pub fn new(
        orchestration_id: impl Into<String>,
        kind: OrchestrationKind,
        strategy: StrategySpec,
    ) -> Self {
        let now = Utc::now();
        Self {
            orchestration_id: orchestration_id.into(),
            kind,
            state: OrchestrationState::Pending,
            description: String::new(),
            strategy,
            created_at: now,
            updated_at: now,
        }
    }
}
