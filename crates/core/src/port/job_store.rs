// Job Store Port (Interface)

use crate::domain::error::Result as DomainResult;
use crate::domain::{Job, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Mutation applied by [`JobStore::update`]
///
/// Returning an error discards the mutation; the stored job is left as it was.
pub type JobMutator<'a> = Box<dyn FnOnce(&mut Job) -> DomainResult<()> + Send + 'a>;

/// Keyed repository of jobs
///
/// The sole point of concurrent access to a job. `update` is atomic with
/// respect to any other `get`/`update` on the same ID; no ordering is
/// promised across different IDs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job (`Conflict` if the ID is taken)
    async fn put(&self, job: &Job) -> Result<()>;

    /// Consistent copy of a job (`NotFound` if unknown)
    async fn get(&self, id: &str) -> Result<Job>;

    /// Apply `mutator` atomically and return the job as stored afterwards
    async fn update(&self, id: &str, mutator: JobMutator<'_>) -> Result<Job>;

    /// All jobs, optionally filtered by status, oldest first
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>>;

    /// Count jobs in the given status
    async fn count_by_status(&self, status: JobStatus) -> Result<usize> {
        Ok(self.list(Some(status)).await?.len())
    }
}
