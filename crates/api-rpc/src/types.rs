//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results.

use provisio_core::application::JobStats;
use provisio_core::domain::request::{
    DEFAULT_DISPLAY_NAME, DEFAULT_MAX_ATTEMPTS, DEFAULT_SHAPE_NAME,
};
use provisio_core::domain::{
    AttemptRecord, JobId, JobSnapshot, JobStatus, LatencyClass, Placement, RegionInfo,
    ResourceRequest, ResourceShape,
};
use serde::{Deserialize, Serialize};

/// vm.start.v1 - Start acquiring a VM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    /// Single region; tried ahead of `regions` when both are given
    #[serde(default)]
    pub region: Option<String>,
    /// Ordered region preference
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default = "default_shape")]
    pub shape: String,
    #[serde(default = "default_ocpus")]
    pub ocpus: u32,
    #[serde(default = "default_memory_gb")]
    pub memory_gb: u32,
    #[serde(default = "default_storage_gb")]
    pub storage_gb: u32,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_shape() -> String {
    DEFAULT_SHAPE_NAME.to_string()
}

fn default_ocpus() -> u32 {
    ResourceShape::default().ocpus
}

fn default_memory_gb() -> u32 {
    ResourceShape::default().memory_gb
}

fn default_storage_gb() -> u32 {
    ResourceShape::default().storage_gb
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            region: None,
            regions: None,
            shape: default_shape(),
            ocpus: default_ocpus(),
            memory_gb: default_memory_gb(),
            storage_gb: default_storage_gb(),
            display_name: default_display_name(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl From<StartRequest> for ResourceRequest {
    fn from(req: StartRequest) -> Self {
        ResourceRequest {
            placement: Placement::from_parts(req.region, req.regions),
            shape_name: req.shape,
            shape: ResourceShape {
                ocpus: req.ocpus,
                memory_gb: req.memory_gb,
                storage_gb: req.storage_gb,
            },
            display_name: req.display_name,
            max_attempts: req.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// vm.status.v1 - One job, or every active job when `job_id` is omitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusResponse {
    Job(JobSnapshot),
    Active { jobs: Vec<JobSnapshot>, count: usize },
}

/// vm.stop.v1 - Stop a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRequest {
    pub job_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub job_id: JobId,
    /// Stop accepted for a live job
    pub stopped: bool,
    /// Job had already finished before the request
    pub already_terminal: bool,
    pub status: JobStatus,
}

/// vm.attempts.v1 - Attempt history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptsRequest {
    pub job_id: String,
    #[serde(default = "default_attempt_limit")]
    pub limit: usize,
}

fn default_attempt_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptsResponse {
    pub job_id: JobId,
    pub attempts: Vec<AttemptRecord>,
}

/// regions.list.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionEntry {
    pub id: String,
    pub name: String,
    pub success_rate: f64,
    pub latency_ms: (u32, u32),
    pub latency_class: LatencyClass,
    pub estimated_time: String,
}

impl From<&RegionInfo> for RegionEntry {
    fn from(info: &RegionInfo) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            success_rate: info.success_rate,
            latency_ms: info.latency_ms,
            latency_class: info.latency_class(),
            estimated_time: info.estimated_time.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsResponse {
    pub regions: Vec<RegionEntry>,
}

/// admin.stats.v1 - Job counts and uptime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: usize,
    pub queued_jobs: usize,
    pub running_jobs: usize,
    pub succeeded_jobs: usize,
    pub failed_jobs: usize,
    pub stopped_jobs: usize,
    pub active_loops: usize,
    pub uptime_seconds: u64,
}

impl StatsResponse {
    pub fn from_stats(stats: &JobStats, uptime_seconds: u64) -> Self {
        Self {
            total_jobs: stats.total(),
            queued_jobs: stats.queued,
            running_jobs: stats.running,
            succeeded_jobs: stats.succeeded,
            failed_jobs: stats.failed,
            stopped_jobs: stats.stopped,
            active_loops: stats.active_loops,
            uptime_seconds,
        }
    }
}

/// admin.health.v1 - Liveness for supervisors; answering means the store is reachable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub active_loops: usize,
    pub uptime_seconds: u64,
}
