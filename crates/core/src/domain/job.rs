// Job Domain Model

use crate::domain::attempt::{AttemptOutcome, AttemptRecord, ResourceHandle};
use crate::domain::error::{DomainError, Result};
use crate::domain::region::RegionId;
use crate::domain::request::ResourceRequest;
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Job Status
///
/// `Queued` and `Running` are the only non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::Stopped,
    ];
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            "STOPPED" => Ok(JobStatus::Stopped),
            other => Err(DomainError::InvalidConfiguration(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

/// Terminal subset of [`JobStatus`], used for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Succeeded,
    Failed,
    Stopped,
}

impl TryFrom<JobStatus> for TerminalStatus {
    type Error = DomainError;

    fn try_from(status: JobStatus) -> Result<Self> {
        match status {
            JobStatus::Succeeded => Ok(TerminalStatus::Succeeded),
            JobStatus::Failed => Ok(TerminalStatus::Failed),
            JobStatus::Stopped => Ok(TerminalStatus::Stopped),
            other => Err(DomainError::InvalidStateTransition {
                from: other.to_string(),
                to: "TERMINAL".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalStatus::Succeeded => write!(f, "SUCCEEDED"),
            TerminalStatus::Failed => write!(f, "FAILED"),
            TerminalStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Job Entity
///
/// Mutated only through the methods below, which keep the attempt history
/// and status consistent:
/// - `attempts.len() <= request.max_attempts`
/// - `Succeeded` iff the last attempt succeeded
/// - once terminal, nothing is appended and the status never changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub request: ResourceRequest,
    pub status: JobStatus,
    pub attempts: Vec<AttemptRecord>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub last_error: Option<String>,
    /// Pending (or honoured) stop request reason
    pub stop_reason: Option<String>,
    /// Provisioned resource, set on success
    pub resource: Option<ResourceHandle>,
}

impl Job {
    /// Create a new Job in `Queued`
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `request` - The originating request
    pub fn new(id: impl Into<String>, created_at: i64, request: ResourceRequest) -> Self {
        Self {
            id: id.into(),
            request,
            status: JobStatus::Queued,
            attempts: Vec::new(),
            created_at,
            updated_at: created_at,
            started_at: None,
            finished_at: None,
            last_error: None,
            stop_reason: None,
            resource: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count() >= self.request.max_attempts
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_reason.is_some() && !self.is_terminal()
    }

    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }

    /// Sequence number the next attempt will carry
    pub fn next_sequence(&self) -> u32 {
        self.attempt_count() + 1
    }

    /// Transition Queued -> Running
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "RUNNING".to_string(),
            });
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    /// Record a stop request; the owning loop honours it between attempts
    ///
    /// A second request while one is pending keeps the first reason.
    pub fn request_stop(&mut self, reason: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.is_terminal() {
            return Err(DomainError::AlreadyTerminal(self.status.to_string()));
        }
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason.into());
            self.updated_at = now_millis;
        }
        Ok(())
    }

    /// Transition Queued|Running -> Stopped
    pub fn stop(&mut self, now_millis: i64) -> Result<()> {
        if self.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "STOPPED".to_string(),
            });
        }
        self.status = JobStatus::Stopped;
        self.finish(now_millis);
        Ok(())
    }

    /// Transition Queued|Running -> Failed without a new attempt
    /// (e.g. the job's placement can no longer be ranked)
    pub fn abort(&mut self, reason: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "FAILED".to_string(),
            });
        }
        self.last_error = Some(reason.into());
        self.status = JobStatus::Failed;
        self.finish(now_millis);
        Ok(())
    }

    /// Append the next attempt and apply the resulting transition
    ///
    /// Returns the status after the attempt:
    /// - `Succeeded` on success
    /// - `Failed` on a fatal outcome, or when the attempt budget is used up
    /// - `Running` when the loop should back off and retry
    pub fn record_attempt(
        &mut self,
        region: impl Into<RegionId>,
        outcome: &AttemptOutcome,
        now_millis: i64,
    ) -> Result<JobStatus> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "RUNNING".to_string(),
            });
        }
        if self.attempts_exhausted() {
            return Err(DomainError::AttemptLimitReached {
                max_attempts: self.request.max_attempts,
            });
        }

        let record = AttemptRecord::new(self.next_sequence(), region, now_millis, outcome);
        self.attempts.push(record);
        self.updated_at = now_millis;

        if let Some(msg) = outcome.message() {
            self.last_error = Some(msg.to_string());
        }

        match outcome {
            AttemptOutcome::Succeeded(handle) => {
                self.resource = Some(handle.clone());
                self.status = JobStatus::Succeeded;
                self.finish(now_millis);
            }
            AttemptOutcome::FatalError(_) => {
                self.status = JobStatus::Failed;
                self.finish(now_millis);
            }
            AttemptOutcome::CapacityUnavailable(_) | AttemptOutcome::TransientError(_) => {
                if self.attempts_exhausted() {
                    self.status = JobStatus::Failed;
                    self.finish(now_millis);
                }
            }
        }

        Ok(self.status)
    }

    fn finish(&mut self, now_millis: i64) {
        self.finished_at = Some(now_millis);
        self.updated_at = now_millis;
    }

    /// Read-only view handed to callers polling for status
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            display_name: self.request.display_name.clone(),
            attempt_count: self.attempt_count(),
            max_attempts: self.request.max_attempts,
            last_region: self.last_attempt().map(|a| a.region.clone()),
            last_error: self.last_error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            stop_reason: self.stop_reason.clone(),
            resource: self.resource.clone(),
        }
    }
}

/// Consistent point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub display_name: String,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub last_region: Option<RegionId>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub stop_reason: Option<String>,
    pub resource: Option<ResourceHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_job(max_attempts: u32) -> Job {
        let request = ResourceRequest::in_region("us-phoenix-1").with_max_attempts(max_attempts);
        let mut job = Job::new("job-1", 1000, request);
        job.start(2000).unwrap();
        job
    }

    fn capacity() -> AttemptOutcome {
        AttemptOutcome::CapacityUnavailable("Out of host capacity.".into())
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("job-1", 1000, ResourceRequest::default());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.attempts.is_empty());
        assert_eq!(job.updated_at, 1000);
        assert!(job.last_error.is_none());
    }

    #[test]
    fn test_start_only_from_queued() {
        let mut job = running_job(3);
        assert!(job.start(3000).is_err());
        assert_eq!(job.started_at, Some(2000));
    }

    #[test]
    fn test_retryable_outcome_keeps_running() {
        let mut job = running_job(3);
        let status = job.record_attempt("us-phoenix-1", &capacity(), 3000).unwrap();

        assert_eq!(status, JobStatus::Running);
        assert_eq!(job.attempts[0].sequence, 1);
        assert_eq!(job.last_error.as_deref(), Some("Out of host capacity."));
    }

    #[test]
    fn test_exhaustion_fails_job() {
        let mut job = running_job(2);
        job.record_attempt("r", &capacity(), 3000).unwrap();
        let status = job.record_attempt("r", &capacity(), 4000).unwrap();

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(job.finished_at, Some(4000));
        assert_eq!(job.attempt_count(), 2);
    }

    #[test]
    fn test_terminal_job_rejects_attempts() {
        let mut job = running_job(5);
        job.record_attempt("r", &AttemptOutcome::FatalError("NotAuthenticated".into()), 3000)
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);

        let err = job.record_attempt("r", &capacity(), 4000).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(job.attempt_count(), 1);
    }

    #[test]
    fn test_success_sets_resource() {
        let mut job = running_job(5);
        let handle = ResourceHandle::new("ocid1.instance.x", "us-phoenix-1", "vm");
        job.record_attempt("us-phoenix-1", &AttemptOutcome::Succeeded(handle.clone()), 3000)
            .unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.resource, Some(handle));
        assert!(job.last_error.is_none());
    }

    #[test]
    fn test_request_stop_on_terminal_is_rejected() {
        let mut job = running_job(1);
        job.record_attempt("r", &capacity(), 3000).unwrap();

        let err = job.request_stop("user requested", 4000).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyTerminal(_)));
        assert!(job.stop_reason.is_none());
    }

    #[test]
    fn test_request_stop_keeps_first_reason() {
        let mut job = running_job(3);
        job.request_stop("first", 3000).unwrap();
        job.request_stop("second", 4000).unwrap();

        assert!(job.stop_requested());
        assert_eq!(job.stop_reason.as_deref(), Some("first"));

        job.stop(5000).unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(!job.stop_requested());
    }

    #[test]
    fn test_stop_from_queued() {
        let mut job = Job::new("job-1", 1000, ResourceRequest::default());
        job.request_stop("user requested", 1500).unwrap();
        job.stop(2000).unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(job.stop(3000).is_err());
    }

    #[test]
    fn test_snapshot_reflects_job() {
        let mut job = running_job(3);
        job.record_attempt("ap-tokyo-1", &capacity(), 3000).unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Running);
        assert_eq!(snap.attempt_count, 1);
        assert_eq!(snap.max_attempts, 3);
        assert_eq!(snap.last_region.as_deref(), Some("ap-tokyo-1"));
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in JobStatus::ALL {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
    }
}
