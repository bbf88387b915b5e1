// Attempt loop: the only place that runs attempts for a job

use super::constants::ERROR_RECOVERY_SLEEP_DURATION;
use super::{JobController, ShutdownToken};
use crate::domain::{AttemptOutcome, DomainError, Job, JobStatus, PlacementCandidate, RegionId};
use crate::error::{AppError, Result};
use crate::port::{Notification, ProgressEvent, ProgressUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// What the top of an iteration decided
enum Gate {
    /// Job is running and may attempt again; `started` when it left the queue just now
    Proceed { job: Job, started: bool },
    /// A pending stop was honoured just now
    Stopped(Job),
    /// Job was already terminal; nothing left to do
    Finished,
}

/// How a wait between iterations ended
enum Wake {
    Elapsed,
    Nudged,
    Shutdown,
}

impl JobController {
    /// Run attempts for `job_id` until it is terminal or shutdown is signalled
    pub(super) async fn drive(&self, job_id: &str, waker: Arc<Notify>, mut shutdown: ShutdownToken) {
        let candidates = match self.candidates_for(job_id).await {
            Ok(Some(candidates)) => candidates,
            Ok(None) => return,
            Err(e) => {
                error!(job_id, error = %e, "Could not load job, attempt loop not started");
                return;
            }
        };

        info!(job_id, candidates = candidates.len(), "Attempt loop started");

        loop {
            if shutdown.is_shutdown() {
                info!(job_id, "Attempt loop parked for shutdown");
                return;
            }

            let job = match self.gate(job_id).await {
                Ok(Gate::Proceed { job, started }) => {
                    if started && self.config.progress.reports_start() {
                        self.notify_progress(&job, ProgressEvent::Started, 0, None).await;
                    }
                    job
                }
                Ok(Gate::Stopped(job)) => {
                    info!(
                        job_id,
                        attempts = job.attempt_count(),
                        reason = job.stop_reason.as_deref().unwrap_or_default(),
                        "Job stopped"
                    );
                    self.notify_terminal(&job).await;
                    return;
                }
                Ok(Gate::Finished) => return,
                Err(AppError::NotFound(_)) => {
                    warn!(job_id, "Job vanished from store, attempt loop exiting");
                    return;
                }
                Err(e) => {
                    error!(job_id, error = %e, "Store error at loop gate");
                    if let Wake::Shutdown = wait(&waker, &mut shutdown, ERROR_RECOVERY_SLEEP_DURATION).await {
                        return;
                    }
                    continue;
                }
            };

            let sequence = job.next_sequence();
            let candidate = &candidates[(sequence as usize - 1) % candidates.len()];

            debug!(job_id, attempt = sequence, region = %candidate.region, "Attempting");
            if self.config.progress.reports_attempt(sequence) {
                self.notify_progress(&job, ProgressEvent::Attempting, sequence, Some(&candidate.region))
                    .await;
            }
            let outcome = self.executor.execute(candidate, &job.request).await;
            let now = self.time_provider.now_millis();

            let Some(job) = self
                .record(job_id, sequence, &candidate.region, &outcome, now, &waker, &mut shutdown)
                .await
            else {
                return;
            };

            match job.status {
                JobStatus::Succeeded => {
                    info!(
                        job_id,
                        attempt = sequence,
                        region = %candidate.region,
                        resource_id = job.resource.as_ref().map(|r| r.resource_id.as_str()).unwrap_or_default(),
                        "Job succeeded"
                    );
                    self.notify_terminal(&job).await;
                    return;
                }
                JobStatus::Failed => {
                    warn!(
                        job_id,
                        attempt = sequence,
                        outcome = %outcome.kind(),
                        error = job.last_error.as_deref().unwrap_or_default(),
                        "Job failed"
                    );
                    self.notify_terminal(&job).await;
                    return;
                }
                _ => {}
            }

            let delay = self.config.backoff.delay_for(job_id, job.attempt_count());
            info!(
                job_id,
                attempt = sequence,
                max_attempts = job.request.max_attempts,
                region = %candidate.region,
                outcome = %outcome.kind(),
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, backing off"
            );
            if self.config.progress.reports_wait(delay) {
                let event = ProgressEvent::Retrying {
                    delay_secs: delay.as_secs(),
                    last_error: job.last_error.clone(),
                };
                self.notify_progress(&job, event, sequence, Some(&candidate.region)).await;
            }

            match wait(&waker, &mut shutdown, delay).await {
                Wake::Elapsed => {}
                Wake::Nudged => debug!(job_id, "Backoff cut short"),
                Wake::Shutdown => {
                    info!(job_id, "Attempt loop parked for shutdown");
                    return;
                }
            }
        }
    }

    /// Persist one attempt, retrying store errors until it lands
    ///
    /// The attempt itself is never repeated: a launched resource must not be
    /// launched twice because its record failed to write. Returns `None` when
    /// the loop has to exit.
    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        job_id: &str,
        sequence: u32,
        region: &RegionId,
        outcome: &AttemptOutcome,
        now: i64,
        waker: &Notify,
        shutdown: &mut ShutdownToken,
    ) -> Option<Job> {
        loop {
            let region = region.clone();
            let recorded = outcome.clone();
            let updated = self
                .store
                .update(
                    job_id,
                    Box::new(move |job: &mut Job| {
                        // A write that failed after committing already holds this attempt
                        if job.attempt_count() >= sequence {
                            return Ok(());
                        }
                        job.record_attempt(region, &recorded, now).map(|_| ())
                    }),
                )
                .await;

            match updated {
                Ok(job) => return Some(job),
                Err(AppError::Domain(e)) => {
                    // Only this loop records attempts, so the job changed under us
                    error!(job_id, error = %e, "Attempt could not be recorded, attempt loop exiting");
                    return None;
                }
                Err(e) => {
                    error!(job_id, attempt = sequence, error = %e, "Failed to record attempt, retrying write");
                    if let Wake::Shutdown = wait(waker, shutdown, ERROR_RECOVERY_SLEEP_DURATION).await {
                        let resource_id = match outcome {
                            AttemptOutcome::Succeeded(handle) => handle.resource_id.as_str(),
                            _ => "",
                        };
                        error!(
                            job_id,
                            attempt = sequence,
                            outcome = %outcome.kind(),
                            resource_id,
                            "Shutdown before attempt was recorded"
                        );
                        return None;
                    }
                }
            }
        }
    }

    /// Rank candidates once per loop; an unrankable job is failed outright
    async fn candidates_for(&self, job_id: &str) -> Result<Option<Vec<PlacementCandidate>>> {
        let job = self.store.get(job_id).await?;
        if job.is_terminal() {
            return Ok(None);
        }

        match self.catalog.rank(&job.request.placement) {
            Ok(candidates) => Ok(Some(candidates)),
            Err(e) => {
                warn!(job_id, error = %e, "Placement cannot be ranked, failing job");
                let now = self.time_provider.now_millis();
                let reason = e.to_string();
                match self
                    .store
                    .update(job_id, Box::new(move |job: &mut Job| job.abort(reason, now)))
                    .await
                {
                    Ok(job) => self.notify_terminal(&job).await,
                    Err(AppError::Domain(_)) => {}
                    Err(e) => return Err(e),
                }
                Ok(None)
            }
        }
    }

    /// Honour a pending stop, or move a queued job to running
    async fn gate(&self, job_id: &str) -> Result<Gate> {
        let now = self.time_provider.now_millis();
        let mut started = false;
        let flag = &mut started;
        let result = self
            .store
            .update(
                job_id,
                Box::new(move |job: &mut Job| {
                    if job.is_terminal() {
                        return Err(DomainError::AlreadyTerminal(job.status.to_string()));
                    }
                    if job.stop_requested() {
                        return job.stop(now);
                    }
                    if job.status == JobStatus::Queued {
                        job.start(now)?;
                        *flag = true;
                    }
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(job) if job.status == JobStatus::Stopped => Ok(Gate::Stopped(job)),
            Ok(job) => Ok(Gate::Proceed { job, started }),
            Err(AppError::Domain(DomainError::AlreadyTerminal(_))) => Ok(Gate::Finished),
            Err(e) => Err(e),
        }
    }

    /// Deliver the terminal notification; failures never touch the job
    pub(super) async fn notify_terminal(&self, job: &Job) {
        let Some(notification) = Notification::from_job(job) else {
            return;
        };

        match tokio::time::timeout(self.config.notify_timeout, self.notifier.notify(&notification)).await {
            Ok(Ok(())) => debug!(job_id = %job.id, status = %notification.status, "Notification delivered"),
            Ok(Err(e)) => warn!(job_id = %job.id, error = %e, "Notification failed"),
            Err(_) => warn!(
                job_id = %job.id,
                timeout_ms = self.config.notify_timeout.as_millis() as u64,
                "Notification timed out"
            ),
        }
    }

    /// Deliver a progress notice under the same timeout as terminal ones
    async fn notify_progress(
        &self,
        job: &Job,
        event: ProgressEvent,
        attempt: u32,
        region: Option<&RegionId>,
    ) {
        let update = ProgressUpdate {
            job_id: job.id.clone(),
            display_name: job.request.display_name.clone(),
            event,
            attempt,
            max_attempts: job.request.max_attempts,
            region: region.cloned(),
        };

        match tokio::time::timeout(self.config.notify_timeout, self.notifier.progress(&update)).await {
            Ok(Ok(())) => debug!(job_id = %job.id, attempt, "Progress delivered"),
            Ok(Err(e)) => warn!(job_id = %job.id, error = %e, "Progress notification failed"),
            Err(_) => warn!(job_id = %job.id, "Progress notification timed out"),
        }
    }
}

/// Sleep for `delay`, cut short by a stop nudge or shutdown
async fn wait(waker: &Notify, shutdown: &mut ShutdownToken, delay: Duration) -> Wake {
    tokio::select! {
        _ = sleep(delay) => Wake::Elapsed,
        _ = waker.notified() => Wake::Nudged,
        _ = shutdown.wait() => Wake::Shutdown,
    }
}
