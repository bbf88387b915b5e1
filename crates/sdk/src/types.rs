//! SDK Request/Response Types
//!
//! Mirrors the daemon's JSON-RPC types without depending on its crates.

use serde::{Deserialize, Serialize};

/// Job status as reported by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped
        )
    }
}

/// Parameters for `vm.start.v1`; unset fields take the daemon's defaults
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl StartRequest {
    pub fn in_region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Self::default()
        }
    }

    pub fn in_regions(regions: Vec<String>) -> Self {
        Self {
            regions: Some(regions),
            ..Self::default()
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn shape(mut self, ocpus: u32, memory_gb: u32, storage_gb: u32) -> Self {
        self.ocpus = Some(ocpus);
        self.memory_gb = Some(memory_gb);
        self.storage_gb = Some(storage_gb);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Instance handed back on success
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub resource_id: String,
    pub region: String,
    pub display_name: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub display_name: String,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub last_region: Option<String>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub stop_reason: Option<String>,
    pub resource: Option<Resource>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ActiveJobs {
    pub jobs: Vec<JobSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StopRequest {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopResponse {
    pub job_id: String,
    pub stopped: bool,
    pub already_terminal: bool,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptRecord {
    pub sequence: u32,
    pub region: String,
    pub attempted_at: i64,
    pub outcome: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AttemptsResponse {
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub success_rate: f64,
    pub latency_ms: (u32, u32),
    pub latency_class: String,
    pub estimated_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RegionsResponse {
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub service: String,
    pub version: String,
    pub active_loops: usize,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stats {
    pub total_jobs: usize,
    pub queued_jobs: usize,
    pub running_jobs: usize,
    pub succeeded_jobs: usize,
    pub failed_jobs: usize,
    pub stopped_jobs: usize,
    pub active_loops: usize,
    pub uptime_seconds: u64,
}
