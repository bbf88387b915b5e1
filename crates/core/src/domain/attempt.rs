// Attempt Domain Model

use crate::domain::region::RegionId;
use serde::{Deserialize, Serialize};

/// Classified result of one provisioning attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Succeeded,
    CapacityUnavailable,
    TransientError,
    FatalError,
}

impl OutcomeKind {
    /// Whether the controller may try again after this outcome
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OutcomeKind::CapacityUnavailable | OutcomeKind::TransientError
        )
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Succeeded => write!(f, "SUCCEEDED"),
            OutcomeKind::CapacityUnavailable => write!(f, "CAPACITY_UNAVAILABLE"),
            OutcomeKind::TransientError => write!(f, "TRANSIENT_ERROR"),
            OutcomeKind::FatalError => write!(f, "FATAL_ERROR"),
        }
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCEEDED" => Ok(OutcomeKind::Succeeded),
            "CAPACITY_UNAVAILABLE" => Ok(OutcomeKind::CapacityUnavailable),
            "TRANSIENT_ERROR" => Ok(OutcomeKind::TransientError),
            "FATAL_ERROR" => Ok(OutcomeKind::FatalError),
            other => Err(format!("unknown outcome: {}", other)),
        }
    }
}

/// What the provider handed back on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub resource_id: String,
    pub region: RegionId,
    pub display_name: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

impl ResourceHandle {
    pub fn new(
        resource_id: impl Into<String>,
        region: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            region: region.into(),
            display_name: display_name.into(),
            public_ip: None,
            private_ip: None,
        }
    }
}

/// Full outcome as returned by the attempt executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded(ResourceHandle),
    CapacityUnavailable(String),
    TransientError(String),
    FatalError(String),
}

impl AttemptOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AttemptOutcome::Succeeded(_) => OutcomeKind::Succeeded,
            AttemptOutcome::CapacityUnavailable(_) => OutcomeKind::CapacityUnavailable,
            AttemptOutcome::TransientError(_) => OutcomeKind::TransientError,
            AttemptOutcome::FatalError(_) => OutcomeKind::FatalError,
        }
    }

    /// Diagnostic text, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Succeeded(_) => None,
            AttemptOutcome::CapacityUnavailable(msg)
            | AttemptOutcome::TransientError(msg)
            | AttemptOutcome::FatalError(msg) => Some(msg),
        }
    }
}

/// One historical attempt, immutable once appended to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based, monotonic per job
    pub sequence: u32,
    pub region: RegionId,
    pub attempted_at: i64, // epoch ms
    pub outcome: OutcomeKind,
    pub message: Option<String>,
}

impl AttemptRecord {
    pub fn new(
        sequence: u32,
        region: impl Into<String>,
        attempted_at: i64,
        outcome: &AttemptOutcome,
    ) -> Self {
        Self {
            sequence,
            region: region.into(),
            attempted_at,
            outcome: outcome.kind(),
            message: outcome.message().map(str::to_string),
        }
    }
}
