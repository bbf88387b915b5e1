// Region Domain Model

use serde::{Deserialize, Serialize};

/// Provider region identifier (e.g. "us-phoenix-1")
pub type RegionId = String;

/// Coarse expected-latency bucket, ordered Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LatencyClass {
    Low,
    Medium,
    High,
}

impl LatencyClass {
    /// Bucket a latency midpoint: Low < 50ms <= Medium < 150ms <= High
    pub fn from_millis(ms: u32) -> Self {
        match ms {
            0..=49 => LatencyClass::Low,
            50..=149 => LatencyClass::Medium,
            _ => LatencyClass::High,
        }
    }
}

impl std::fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LatencyClass::Low => write!(f, "LOW"),
            LatencyClass::Medium => write!(f, "MEDIUM"),
            LatencyClass::High => write!(f, "HIGH"),
        }
    }
}

/// Catalog entry: one region plus its historical statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub id: RegionId,
    pub name: String,
    /// Historical success rate, 0.0 - 1.0
    pub success_rate: f64,
    /// Expected round-trip latency range in ms (min, max)
    pub latency_ms: (u32, u32),
    /// Human readable acquisition estimate ("3-7 days")
    pub estimated_time: String,
}

impl RegionInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        success_rate: f64,
        latency_ms: (u32, u32),
        estimated_time: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            success_rate: success_rate.clamp(0.0, 1.0),
            latency_ms,
            estimated_time: estimated_time.into(),
        }
    }

    pub fn latency_class(&self) -> LatencyClass {
        let (lo, hi) = self.latency_ms;
        LatencyClass::from_millis(lo / 2 + hi / 2)
    }
}

/// A region considered for one provisioning attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementCandidate {
    pub region: RegionId,
    pub success_rate: f64,
    pub latency: LatencyClass,
}

impl From<&RegionInfo> for PlacementCandidate {
    fn from(info: &RegionInfo) -> Self {
        Self {
            region: info.id.clone(),
            success_rate: info.success_rate,
            latency: info.latency_class(),
        }
    }
}
