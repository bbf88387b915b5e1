// Notifier Port
// Fire-and-forget delivery of terminal job events and opt-in progress

use crate::domain::{Job, JobId, RegionId, ResourceHandle, TerminalStatus};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Terminal event for one job; emitted at most once per terminal transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub job_id: JobId,
    pub status: TerminalStatus,
    pub display_name: String,
    pub attempts: u32,
    pub last_region: Option<RegionId>,
    /// Last error (failed) or stop reason (stopped)
    pub detail: Option<String>,
    pub resource: Option<ResourceHandle>,
}

impl Notification {
    /// Build from a job that has just reached a terminal state
    ///
    /// Returns `None` if the job is not terminal.
    pub fn from_job(job: &Job) -> Option<Self> {
        let status = TerminalStatus::try_from(job.status).ok()?;
        let detail = match status {
            TerminalStatus::Succeeded => None,
            TerminalStatus::Failed => job.last_error.clone(),
            TerminalStatus::Stopped => job.stop_reason.clone(),
        };

        Some(Self {
            job_id: job.id.clone(),
            status,
            display_name: job.request.display_name.clone(),
            attempts: job.attempt_count(),
            last_region: job.last_attempt().map(|a| a.region.clone()),
            detail,
            resource: job.resource.clone(),
        })
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        match self.status {
            TerminalStatus::Succeeded => {
                let (id, region) = self
                    .resource
                    .as_ref()
                    .map(|r| (r.resource_id.as_str(), r.region.as_str()))
                    .unwrap_or(("unknown", "unknown"));
                format!(
                    "{} created in {} after {} attempt(s) ({})",
                    self.display_name, region, self.attempts, id
                )
            }
            TerminalStatus::Failed => format!(
                "{} failed after {} attempt(s): {}",
                self.display_name,
                self.attempts,
                self.detail.as_deref().unwrap_or("unknown error")
            ),
            TerminalStatus::Stopped => format!(
                "{} stopped after {} attempt(s): {}",
                self.display_name,
                self.attempts,
                self.detail.as_deref().unwrap_or("user requested")
            ),
        }
    }
}

/// Non-terminal milestone of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Loop picked the job up and is about to make its first attempt
    Started,
    /// Attempt `attempt` is about to run in `region`
    Attempting,
    /// Attempt `attempt` failed; the next one is `delay_secs` away
    Retrying {
        delay_secs: u64,
        last_error: Option<String>,
    },
}

/// Progress notice for a job that is still running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub display_name: String,
    #[serde(flatten)]
    pub event: ProgressEvent,
    pub attempt: u32,
    pub max_attempts: u32,
    pub region: Option<RegionId>,
}

impl ProgressUpdate {
    pub fn summary(&self) -> String {
        match &self.event {
            ProgressEvent::Started => format!(
                "{}: acquisition started ({} attempt(s) allowed)",
                self.display_name, self.max_attempts
            ),
            ProgressEvent::Attempting => format!(
                "{}: attempt {}/{} in {}",
                self.display_name,
                self.attempt,
                self.max_attempts,
                self.region.as_deref().unwrap_or("unknown")
            ),
            ProgressEvent::Retrying { delay_secs, .. } => format!(
                "{}: attempt {}/{} failed, next try in {}s",
                self.display_name, self.attempt, self.max_attempts, delay_secs
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Rejected by receiver (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Timed out")]
    Timeout,
}

/// Notifier trait
///
/// Errors are reported to the caller but never change job state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Progress of a running job; sinks that only care about outcomes ignore it
    async fn progress(&self, _update: &ProgressUpdate) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes notifications to the log (default sink)
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            job_id = %notification.job_id,
            status = %notification.status,
            attempts = notification.attempts,
            "{}",
            notification.summary()
        );
        Ok(())
    }

    async fn progress(&self, update: &ProgressUpdate) -> Result<(), NotifyError> {
        tracing::info!(job_id = %update.job_id, attempt = update.attempt, "{}", update.summary());
        Ok(())
    }
}

/// Fans out to several notifiers; every sink is tried
///
/// The first error is returned after all sinks ran.
pub struct CompositeNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let results = join_all(self.sinks.iter().map(|sink| sink.notify(notification))).await;

        let mut first_error = None;
        for e in results.into_iter().filter_map(Result::err) {
            tracing::warn!(job_id = %notification.job_id, error = %e, "Notifier sink failed");
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn progress(&self, update: &ProgressUpdate) -> Result<(), NotifyError> {
        let results = join_all(self.sinks.iter().map(|sink| sink.progress(update))).await;

        let mut first_error = None;
        for e in results.into_iter().filter_map(Result::err) {
            tracing::debug!(job_id = %update.job_id, error = %e, "Progress sink failed");
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification it receives
    #[derive(Default)]
    pub struct RecordingNotifier {
        received: Mutex<Vec<Notification>>,
        progress: Mutex<Vec<ProgressUpdate>>,
        fail: bool,
    }

    impl RecordingNotifier {
        /// Records, then reports a delivery error
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn received(&self) -> Vec<Notification> {
            self.received.lock().unwrap().clone()
        }

        pub fn progress_received(&self) -> Vec<ProgressUpdate> {
            self.progress.lock().unwrap().clone()
        }

        pub fn count_for(&self, job_id: &str) -> usize {
            self.received
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.job_id == job_id)
                .count()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.received.lock().unwrap().push(notification.clone());
            if self.fail {
                return Err(NotifyError::Delivery("mock sink down".to_string()));
            }
            Ok(())
        }

        async fn progress(&self, update: &ProgressUpdate) -> Result<(), NotifyError> {
            self.progress.lock().unwrap().push(update.clone());
            if self.fail {
                return Err(NotifyError::Delivery("mock sink down".to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::RecordingNotifier;
    use super::*;
    use crate::domain::{AttemptOutcome, ResourceRequest};

    fn running_job() -> Job {
        let mut job = Job::new("vm-job-1", 1_000, ResourceRequest::in_region("ap-tokyo-1"));
        job.start(1_001).unwrap();
        job
    }

    #[test]
    fn test_non_terminal_job_yields_no_notification() {
        assert!(Notification::from_job(&running_job()).is_none());
    }

    #[test]
    fn test_success_notification_carries_resource() {
        let mut job = running_job();
        let handle = ResourceHandle::new("ocid1.instance.x", "ap-tokyo-1", "AutoCreated-VM");
        job.record_attempt("ap-tokyo-1", &AttemptOutcome::Succeeded(handle.clone()), 1_002)
            .unwrap();

        let n = Notification::from_job(&job).unwrap();
        assert_eq!(n.status, TerminalStatus::Succeeded);
        assert_eq!(n.resource, Some(handle));
        assert_eq!(n.attempts, 1);
        assert!(n.summary().contains("ap-tokyo-1"));
    }

    #[test]
    fn test_stopped_notification_uses_stop_reason() {
        let mut job = running_job();
        job.request_stop("maintenance window", 1_002).unwrap();
        job.stop(1_003).unwrap();

        let n = Notification::from_job(&job).unwrap();
        assert_eq!(n.status, TerminalStatus::Stopped);
        assert_eq!(n.detail.as_deref(), Some("maintenance window"));
    }

    #[tokio::test]
    async fn test_composite_tries_every_sink() {
        let failing = Arc::new(RecordingNotifier::failing());
        let healthy = Arc::new(RecordingNotifier::default());
        let composite = CompositeNotifier::new(vec![failing.clone(), healthy.clone()]);

        let mut job = running_job();
        job.abort("bad credentials", 1_002).unwrap();
        let n = Notification::from_job(&job).unwrap();

        let result = composite.notify(&n).await;

        assert!(matches!(result, Err(NotifyError::Delivery(_))));
        assert_eq!(failing.received().len(), 1);
        assert_eq!(healthy.received().len(), 1);
    }

    fn retrying() -> ProgressUpdate {
        ProgressUpdate {
            job_id: "vm-job-1".to_string(),
            display_name: "AutoCreated-VM".to_string(),
            event: ProgressEvent::Retrying {
                delay_secs: 90,
                last_error: Some("Out of host capacity.".to_string()),
            },
            attempt: 7,
            max_attempts: 1000,
            region: Some("ap-tokyo-1".to_string()),
        }
    }

    #[test]
    fn test_progress_update_json_is_tagged() {
        let json = serde_json::to_value(retrying()).unwrap();
        assert_eq!(json["event"], "retrying");
        assert_eq!(json["delay_secs"], 90);
        assert_eq!(json["attempt"], 7);
        assert!(retrying().summary().contains("next try in 90s"));
    }

    #[tokio::test]
    async fn test_composite_fans_out_progress() {
        let failing = Arc::new(RecordingNotifier::failing());
        let healthy = Arc::new(RecordingNotifier::default());
        let composite =
            CompositeNotifier::new(vec![failing.clone(), healthy.clone(), Arc::new(LogNotifier)]);

        let result = composite.progress(&retrying()).await;

        assert!(result.is_err());
        assert_eq!(healthy.progress_received(), vec![retrying()]);
        assert!(healthy.received().is_empty());
    }
}
