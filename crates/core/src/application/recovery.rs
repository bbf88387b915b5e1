// Restart recovery: hand unfinished jobs back to the controller
use crate::application::controller::JobController;
use crate::domain::JobStatus;
use crate::port::JobStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// What recovery found and did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub queued: usize,
    pub running: usize,
    /// Jobs with a stop request that the previous run never honoured
    pub stop_pending: usize,
    pub resumed: usize,
}

/// Recovery service
///
/// On daemon startup, restarts the attempt loop of every job that was
/// QUEUED or RUNNING when the previous process exited. Attempt history is
/// kept, so budgets and region cycling continue where they left off; a
/// pending stop is honoured by the loop before it attempts anything.
pub struct RecoveryService {
    store: Arc<dyn JobStore>,
    controller: Arc<JobController>,
}

impl RecoveryService {
    pub fn new(store: Arc<dyn JobStore>, controller: Arc<JobController>) -> Self {
        Self { store, controller }
    }

    pub async fn recover_unfinished(&self) -> crate::error::Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for status in [JobStatus::Queued, JobStatus::Running] {
            for job in self.store.list(Some(status)).await? {
                match status {
                    JobStatus::Queued => report.queued += 1,
                    _ => report.running += 1,
                }
                if job.stop_requested() {
                    report.stop_pending += 1;
                }

                if self.controller.resume(&job) {
                    info!(
                        job_id = %job.id,
                        status = %job.status,
                        attempts = job.attempt_count(),
                        "Resumed unfinished job"
                    );
                    report.resumed += 1;
                } else {
                    warn!(job_id = %job.id, "Job already owned by a loop, not resumed");
                }
            }
        }

        info!(
            queued = report.queued,
            running = report.running,
            stop_pending = report.stop_pending,
            resumed = report.resumed,
            "Recovery complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::memory_store::InMemoryJobStore;
    use crate::domain::{AttemptOutcome, Job, ResourceRequest};
    use crate::port::provisioning_backend::mocks::{MockBehavior, ScriptedBackend};
    use std::time::Duration;

    async fn wait_terminal(store: &InMemoryJobStore, id: &str) -> Job {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = store.get(id).await.unwrap();
                if job.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("job did not finish")
    }

    #[tokio::test]
    async fn test_recovers_queued_running_and_pending_stop() {
        let store = Arc::new(InMemoryJobStore::new());

        let queued = Job::new("queued", 1, ResourceRequest::default());
        let mut running = Job::new("running", 2, ResourceRequest::default());
        running.start(3).unwrap();
        running
            .record_attempt("us-phoenix-1", &AttemptOutcome::CapacityUnavailable("full".into()), 4)
            .unwrap();
        let mut stopping = Job::new("stopping", 5, ResourceRequest::default());
        stopping.start(6).unwrap();
        stopping.request_stop("operator", 7).unwrap();
        let mut done = Job::new("done", 8, ResourceRequest::default());
        done.abort("gone", 9).unwrap();

        for job in [&queued, &running, &stopping, &done] {
            store.put(job).await.unwrap();
        }

        let backend = Arc::new(ScriptedBackend::always(MockBehavior::Succeed));
        let controller = JobController::builder(store.clone(), backend.clone()).build();
        let report = RecoveryService::new(store.clone(), controller)
            .recover_unfinished()
            .await
            .unwrap();

        assert_eq!(
            report,
            RecoveryReport {
                queued: 1,
                running: 2,
                stop_pending: 1,
                resumed: 3,
            }
        );

        assert_eq!(wait_terminal(&store, "queued").await.status, JobStatus::Succeeded);
        let running = wait_terminal(&store, "running").await;
        assert_eq!(running.status, JobStatus::Succeeded);
        assert_eq!(running.attempt_count(), 2);
        let stopping = wait_terminal(&store, "stopping").await;
        assert_eq!(stopping.status, JobStatus::Stopped);
        assert_eq!(stopping.attempt_count(), 0);
    }
}
