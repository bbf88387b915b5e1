//! RPC Method Handlers
//!
//! Thin translation between the wire types and [`JobController`].

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::types::{
    AttemptsRequest, AttemptsResponse, HealthResponse, RegionEntry, RegionsResponse, StartRequest, StartResponse,
    StatsResponse, StatusRequest, StatusResponse, StopRequest, StopResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use provisio_core::application::{JobController, StopOutcome};
use provisio_core::domain::JobStatus;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    controller: Arc<JobController>,
    rate_limiter: RateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(controller: Arc<JobController>, rate_limit: RateLimitConfig) -> Self {
        Self {
            controller,
            rate_limiter: RateLimiter::from_config(rate_limit),
            start_time: Instant::now(),
        }
    }

    fn throttle(&self) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.try_acquire() {
            Ok(())
        } else {
            debug!("Request throttled");
            Err(throttled())
        }
    }

    /// vm.start.v1
    pub async fn start(&self, params: StartRequest) -> Result<StartResponse, ErrorObjectOwned> {
        self.throttle()?;

        let job_id = self
            .controller
            .submit(params.into())
            .await
            .map_err(to_rpc_error)?;

        Ok(StartResponse {
            job_id,
            status: JobStatus::Queued,
        })
    }

    /// vm.status.v1
    pub async fn status(&self, params: StatusRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        match params.job_id {
            Some(job_id) => self
                .controller
                .check_status(&job_id)
                .await
                .map(StatusResponse::Job)
                .map_err(to_rpc_error),
            None => {
                let jobs = self.controller.list_active().await.map_err(to_rpc_error)?;
                Ok(StatusResponse::Active {
                    count: jobs.len(),
                    jobs,
                })
            }
        }
    }

    /// vm.stop.v1
    pub async fn stop(&self, params: StopRequest) -> Result<StopResponse, ErrorObjectOwned> {
        self.throttle()?;

        let outcome = self
            .controller
            .stop(&params.job_id, params.reason)
            .await
            .map_err(to_rpc_error)?;

        let response = match outcome {
            StopOutcome::Acknowledged => {
                let snapshot = self
                    .controller
                    .check_status(&params.job_id)
                    .await
                    .map_err(to_rpc_error)?;
                StopResponse {
                    job_id: params.job_id,
                    stopped: true,
                    already_terminal: false,
                    status: snapshot.status,
                }
            }
            StopOutcome::AlreadyTerminal(status) => StopResponse {
                job_id: params.job_id,
                stopped: false,
                already_terminal: true,
                status,
            },
        };
        Ok(response)
    }

    /// vm.attempts.v1
    pub async fn attempts(
        &self,
        params: AttemptsRequest,
    ) -> Result<AttemptsResponse, ErrorObjectOwned> {
        let attempts = self
            .controller
            .attempts(&params.job_id, Some(params.limit))
            .await
            .map_err(to_rpc_error)?;

        Ok(AttemptsResponse {
            job_id: params.job_id,
            attempts,
        })
    }

    /// regions.list.v1
    pub fn regions(&self) -> RegionsResponse {
        RegionsResponse {
            regions: self
                .controller
                .catalog()
                .regions()
                .iter()
                .map(RegionEntry::from)
                .collect(),
        }
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let stats = self.controller.stats().await.map_err(to_rpc_error)?;
        Ok(StatsResponse::from_stats(
            &stats,
            self.start_time.elapsed().as_secs(),
        ))
    }

    /// admin.health.v1
    pub async fn health(&self) -> Result<HealthResponse, ErrorObjectOwned> {
        let stats = self.controller.stats().await.map_err(to_rpc_error)?;
        Ok(HealthResponse {
            status: "healthy".to_string(),
            service: "provisio".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_loops: stats.active_loops,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }
}
