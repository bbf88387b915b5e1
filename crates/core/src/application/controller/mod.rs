// Job Controller - submit/status/stop plus one attempt loop per job

pub mod constants;
mod attempt_loop;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::attempt_executor::{AttemptExecutor, DEFAULT_ATTEMPT_TIMEOUT};
use crate::application::backoff::BackoffPolicy;
use crate::application::progress::ProgressPolicy;
use crate::application::region_catalog::RegionCatalog;
use crate::application::validation::validate_request;
use crate::domain::{
    AttemptRecord, DomainError, Job, JobId, JobSnapshot, JobStatus, ResourceRequest, ShapeBounds,
};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{IdProvider, JobStore, LogNotifier, Notifier, ProvisioningBackend, TimeProvider};
use constants::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Tunables for the controller and its loops
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub backoff: BackoffPolicy,
    pub attempt_timeout: Duration,
    pub notify_timeout: Duration,
    pub bounds: ShapeBounds,
    pub progress: ProgressPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            bounds: ShapeBounds::default(),
            progress: ProgressPolicy::default(),
        }
    }
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOutcome {
    /// Stop recorded; the loop honours it before its next attempt
    Acknowledged,
    /// Job had already finished; nothing changed
    AlreadyTerminal(JobStatus),
}

/// Job counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stopped: usize,
    /// Attempt loops currently alive in this process
    pub active_loops: usize,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.queued + self.running + self.succeeded + self.failed + self.stopped
    }
}

/// Owns the job lifecycle
///
/// Every job gets its own tokio task running the attempt loop. All job
/// mutation goes through [`JobStore::update`], so callers polling status
/// always see a consistent snapshot.
pub struct JobController {
    store: Arc<dyn JobStore>,
    catalog: Arc<RegionCatalog>,
    executor: AttemptExecutor,
    notifier: Arc<dyn Notifier>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: ControllerConfig,
    /// Wakers of live loops, keyed by job; presence means a loop owns the job
    active: Mutex<HashMap<JobId, Arc<Notify>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: ShutdownSender,
}

/// Builder for [`JobController`]; store and backend are required
pub struct JobControllerBuilder {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn ProvisioningBackend>,
    catalog: RegionCatalog,
    notifier: Arc<dyn Notifier>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: ControllerConfig,
}

impl JobControllerBuilder {
    pub fn catalog(mut self, catalog: RegionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn id_provider(mut self, id_provider: Arc<dyn IdProvider>) -> Self {
        self.id_provider = id_provider;
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<JobController> {
        let (shutdown_tx, _) = shutdown_channel();
        Arc::new(JobController {
            store: self.store,
            catalog: Arc::new(self.catalog),
            executor: AttemptExecutor::new(self.backend, self.config.attempt_timeout),
            notifier: self.notifier,
            id_provider: self.id_provider,
            time_provider: self.time_provider,
            config: self.config,
            active: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        })
    }
}

impl JobController {
    pub fn builder(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn ProvisioningBackend>,
    ) -> JobControllerBuilder {
        JobControllerBuilder {
            store,
            backend,
            catalog: RegionCatalog::seeded(),
            notifier: Arc::new(LogNotifier),
            id_provider: Arc::new(UuidProvider),
            time_provider: Arc::new(SystemTimeProvider),
            config: ControllerConfig::default(),
        }
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    /// Validate, persist a `Queued` job and start its loop
    ///
    /// Returns as soon as the job is stored; an invalid request creates nothing.
    pub async fn submit(self: &Arc<Self>, request: ResourceRequest) -> Result<JobId> {
        validate_request(&request, &self.config.bounds, &self.catalog).map_err(invalid)?;

        if self.shutdown_tx.token().is_shutdown() {
            return Err(AppError::Internal("controller is shutting down".to_string()));
        }

        let job_id = self.id_provider.generate_id();
        let now = self.time_provider.now_millis();
        let job = Job::new(job_id.clone(), now, request);
        self.store.put(&job).await?;

        info!(
            job_id = %job_id,
            display_name = %job.request.display_name,
            max_attempts = job.request.max_attempts,
            "Job submitted"
        );

        self.spawn_loop(job_id.clone());
        Ok(job_id)
    }

    /// Consistent snapshot of one job
    pub async fn check_status(&self, job_id: &str) -> Result<JobSnapshot> {
        Ok(self.store.get(job_id).await?.snapshot())
    }

    /// Ask a job to stop
    ///
    /// Cooperative: an in-flight attempt completes and is recorded first.
    /// A job that is already terminal is acknowledged as such, not an error.
    pub async fn stop(&self, job_id: &str, reason: Option<String>) -> Result<StopOutcome> {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STOP_REASON.to_string());
        let now = self.time_provider.now_millis();

        let result = self
            .store
            .update(job_id, Box::new(move |job: &mut Job| job.request_stop(reason, now)))
            .await;

        match result {
            Ok(_) => {}
            Err(AppError::Domain(DomainError::AlreadyTerminal(_))) => {
                let job = self.store.get(job_id).await?;
                info!(job_id, status = %job.status, "Stop ignored, job already terminal");
                return Ok(StopOutcome::AlreadyTerminal(job.status));
            }
            Err(e) => return Err(e),
        }

        match self.waker(job_id) {
            Some(waker) => {
                info!(job_id, "Stop requested");
                waker.notify_one();
            }
            // No loop owns the job (e.g. it parked for shutdown): finish it here
            None => self.finalize_orphan_stop(job_id).await?,
        }

        Ok(StopOutcome::Acknowledged)
    }

    /// Snapshots of all jobs, optionally filtered by status
    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobSnapshot>> {
        Ok(self
            .store
            .list(status)
            .await?
            .iter()
            .map(Job::snapshot)
            .collect())
    }

    /// Snapshots of queued and running jobs
    pub async fn list_active(&self) -> Result<Vec<JobSnapshot>> {
        let mut active = self.list(Some(JobStatus::Queued)).await?;
        active.extend(self.list(Some(JobStatus::Running)).await?);
        active.sort_by_key(|s| s.created_at);
        Ok(active)
    }

    /// Most recent attempt records, oldest first (`None` returns all)
    pub async fn attempts(&self, job_id: &str, limit: Option<usize>) -> Result<Vec<AttemptRecord>> {
        let job = self.store.get(job_id).await?;
        let skip = limit.map_or(0, |n| job.attempts.len().saturating_sub(n));
        Ok(job.attempts.into_iter().skip(skip).collect())
    }

    pub async fn stats(&self) -> Result<JobStats> {
        let active_loops = self.active_loops();
        Ok(JobStats {
            queued: self.store.count_by_status(JobStatus::Queued).await?,
            running: self.store.count_by_status(JobStatus::Running).await?,
            succeeded: self.store.count_by_status(JobStatus::Succeeded).await?,
            failed: self.store.count_by_status(JobStatus::Failed).await?,
            stopped: self.store.count_by_status(JobStatus::Stopped).await?,
            active_loops,
        })
    }

    /// Start a loop for an existing, non-terminal job (restart recovery)
    ///
    /// Returns false if the job is terminal or a loop already owns it.
    pub fn resume(self: &Arc<Self>, job: &Job) -> bool {
        if job.is_terminal() || self.shutdown_tx.token().is_shutdown() {
            return false;
        }
        self.spawn_loop(job.id.clone())
    }

    /// Signal every loop to park and wait up to `grace` for them
    ///
    /// Job statuses are left as they are; unfinished jobs resume on restart.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown_tx.shutdown();

        let handles: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        info!(loops = handles.len(), "Shutting down attempt loops");

        let joined = tokio::time::timeout(grace, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;

        if joined.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "Attempt loops did not park in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }
    }

    pub fn active_loops(&self) -> usize {
        lock(&self.active).len()
    }

    fn waker(&self, job_id: &str) -> Option<Arc<Notify>> {
        lock(&self.active).get(job_id).cloned()
    }

    fn spawn_loop(self: &Arc<Self>, job_id: JobId) -> bool {
        let waker = {
            let mut active = lock(&self.active);
            if active.contains_key(&job_id) {
                return false;
            }
            let waker = Arc::new(Notify::new());
            active.insert(job_id.clone(), Arc::clone(&waker));
            waker
        };

        let controller = Arc::clone(self);
        let shutdown = self.shutdown_tx.token();
        let handle = tokio::spawn(async move {
            let _guard = ActiveGuard {
                controller: Arc::clone(&controller),
                job_id: job_id.clone(),
            };
            controller.drive(&job_id, waker, shutdown).await;
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
        true
    }

    async fn finalize_orphan_stop(&self, job_id: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        match self
            .store
            .update(job_id, Box::new(move |job: &mut Job| job.stop(now)))
            .await
        {
            Ok(job) => {
                info!(job_id, "Job stopped");
                self.notify_terminal(&job).await;
                Ok(())
            }
            // Someone else finished the job first
            Err(AppError::Domain(DomainError::InvalidStateTransition { .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Releases a job's loop slot however the loop ends
struct ActiveGuard {
    controller: Arc<JobController>,
    job_id: JobId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock(&self.controller.active).remove(&self.job_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn invalid(err: DomainError) -> AppError {
    match err {
        DomainError::InvalidConfiguration(msg) => AppError::InvalidConfiguration(msg),
        other => AppError::Domain(other),
    }
}
