//! Provisio Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    ActiveJobs, AttemptRecord, AttemptsResponse, Health, JobSnapshot, Region, RegionsResponse,
    StartRequest, StartResponse, Stats, StopRequest, StopResponse,
};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Provisio daemon client
///
/// # Example
///
/// ```no_run
/// use provisio_sdk::{ProvisioClient, StartRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ProvisioClient::connect("http://127.0.0.1:9627").await?;
/// let started = client.start(StartRequest::in_region("ap-seoul-1")).await?;
/// let job = client.status(&started.job_id).await?;
/// println!("{} is {:?}", job.job_id, job.status);
/// # Ok(())
/// # }
/// ```
pub struct ProvisioClient {
    client: HttpClient,
}

impl ProvisioClient {
    /// Connect to the daemon (e.g. `http://127.0.0.1:9627`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .build(url.as_ref())
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    /// Submit a new acquisition job
    pub async fn start(&self, request: StartRequest) -> Result<StartResponse> {
        Ok(self
            .client
            .request("vm.start.v1", object_params(&request)?)
            .await?)
    }

    /// Snapshot of one job
    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        let mut params = ObjectParams::new();
        params.insert("job_id", job_id)?;
        Ok(self.client.request("vm.status.v1", params).await?)
    }

    /// Every queued or running job
    pub async fn active_jobs(&self) -> Result<Vec<JobSnapshot>> {
        let active: ActiveJobs = self.client.request("vm.status.v1", rpc_params![]).await?;
        Ok(active.jobs)
    }

    /// Ask a job to stop; finished jobs report `already_terminal`
    pub async fn stop(&self, job_id: &str, reason: Option<&str>) -> Result<StopResponse> {
        let request = StopRequest {
            job_id: job_id.to_string(),
            reason: reason.map(str::to_string),
        };
        Ok(self
            .client
            .request("vm.stop.v1", object_params(&request)?)
            .await?)
    }

    /// The most recent `limit` attempts, oldest first
    pub async fn attempts(&self, job_id: &str, limit: usize) -> Result<Vec<AttemptRecord>> {
        let mut params = ObjectParams::new();
        params.insert("job_id", job_id)?;
        params.insert("limit", limit)?;
        let response: AttemptsResponse = self.client.request("vm.attempts.v1", params).await?;
        Ok(response.attempts)
    }

    pub async fn regions(&self) -> Result<Vec<Region>> {
        let response: RegionsResponse =
            self.client.request("regions.list.v1", rpc_params![]).await?;
        Ok(response.regions)
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(self.client.request("admin.stats.v1", rpc_params![]).await?)
    }

    /// Liveness of the daemon and its store
    pub async fn health(&self) -> Result<Health> {
        Ok(self.client.request("admin.health.v1", rpc_params![]).await?)
    }

    /// Poll until the job is terminal or `timeout` elapses
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
        poll: Duration,
        timeout: Duration,
    ) -> Result<JobSnapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.status(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SdkError::WaitTimeout(job_id.to_string()));
            }
            tokio::time::sleep(poll).await;
        }
    }
}

/// Named params from any struct that serializes to a JSON object
fn object_params<T: Serialize>(value: &T) -> Result<ObjectParams> {
    let Value::Object(map) = serde_json::to_value(value)? else {
        return Err(SdkError::Other("params must serialize to an object".into()));
    };
    let mut params = ObjectParams::new();
    for (key, value) in map {
        params.insert(&key, value)?;
    }
    Ok(params)
}
