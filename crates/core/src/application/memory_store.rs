// In-memory job store (per-job locking, no global lock during mutation)
use crate::domain::{Job, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{JobMutator, JobStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

type Slot = Arc<Mutex<Job>>;

/// Volatile store for tests and single-run daemons
///
/// The map lock is only held to look a job up; mutation happens under
/// that job's own async mutex.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Slot>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &str) -> Result<Slot> {
        self.jobs
            .read()
            .map_err(|_| AppError::Internal("job map lock poisoned".to_string()))?
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("job {}", id)))
    }

    fn slots(&self) -> Result<Vec<Slot>> {
        Ok(self
            .jobs
            .read()
            .map_err(|_| AppError::Internal("job map lock poisoned".to_string()))?
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job: &Job) -> Result<()> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| AppError::Internal("job map lock poisoned".to_string()))?;
        if jobs.contains_key(&job.id) {
            return Err(AppError::Conflict(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id.clone(), Arc::new(Mutex::new(job.clone())));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Job> {
        let slot = self.slot(id)?;
        let job = slot.lock().await;
        Ok(job.clone())
    }

    async fn update(&self, id: &str, mutator: JobMutator<'_>) -> Result<Job> {
        let slot = self.slot(id)?;
        let mut job = slot.lock().await;

        // Mutate a copy so a failing mutator leaves no trace
        let mut draft = job.clone();
        mutator(&mut draft)?;
        *job = draft;
        Ok(job.clone())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut out = Vec::new();
        for slot in self.slots()? {
            let job = slot.lock().await;
            if status.map_or(true, |s| job.status == s) {
                out.push(job.clone());
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }
}
