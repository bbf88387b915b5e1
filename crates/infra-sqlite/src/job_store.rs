// SQLite JobStore Implementation

use async_trait::async_trait;
use provisio_core::domain::{
    AttemptRecord, Job, JobStatus, OutcomeKind, ResourceHandle, ResourceRequest,
};
use provisio_core::error::{AppError, Result};
use provisio_core::port::{JobMutator, JobStore};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" => AppError::Database(format!(
                        "Foreign key constraint violation: {}",
                        db_err.message()
                    )),
                    "5" | "517" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// Durable job store
///
/// Updates are serialized per job by an in-process async mutex; the write
/// itself runs in one transaction that starts with the row UPDATE, so the
/// job row and its new attempt rows land together or not at all.
pub struct SqliteJobStore {
    pool: SqlitePool,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Share of a per-job lock entry
///
/// The map entry is removed when the last lease drops, including when an
/// `update` future is cancelled while waiting on or holding the lock.
struct LockLease<'a> {
    store: &'a SqliteJobStore,
    id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.store.locks();
        let ours = locks
            .get(self.id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock));
        // map + ours
        if ours && Arc::strong_count(&self.lock) == 2 {
            locks.remove(self.id);
        }
    }
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take a share of the per-job lock entry
    fn lease<'a>(&'a self, id: &'a str) -> LockLease<'a> {
        let lock = Arc::clone(self.locks().entry(id.to_string()).or_default());
        LockLease {
            store: self,
            id,
            lock,
        }
    }

    /// Read one job and its attempts as a single snapshot
    async fn load(&self, id: &str) -> Result<Job> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let row = row.ok_or_else(|| AppError::NotFound(format!("job {}", id)))?;

        let attempts: Vec<AttemptRow> =
            sqlx::query_as("SELECT * FROM attempts WHERE job_id = ? ORDER BY sequence")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        row.into_job(attempts)
    }

    async fn insert_attempts(
        tx: &mut Transaction<'_, Sqlite>,
        job_id: &str,
        attempts: &[AttemptRecord],
    ) -> Result<()> {
        for attempt in attempts {
            sqlx::query(
                r#"
                INSERT INTO attempts (job_id, sequence, region, attempted_at, outcome, message)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(job_id)
            .bind(attempt.sequence as i64)
            .bind(&attempt.region)
            .bind(attempt.attempted_at)
            .bind(attempt.outcome.to_string())
            .bind(&attempt.message)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    async fn write(&self, before: &Job, after: &Job) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Writing first takes the write lock up front
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?, updated_at = ?, started_at = ?, finished_at = ?,
                last_error = ?, stop_reason = ?, resource = ?
            WHERE id = ?
            "#,
        )
        .bind(after.status.to_string())
        .bind(after.updated_at)
        .bind(after.started_at)
        .bind(after.finished_at)
        .bind(&after.last_error)
        .bind(&after.stop_reason)
        .bind(encode_resource(after.resource.as_ref())?)
        .bind(&after.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("job {}", after.id)));
        }

        let new_attempts = after.attempts.get(before.attempts.len()..).unwrap_or_default();
        Self::insert_attempts(&mut tx, &after.id, new_attempts).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(
            job_id = %after.id,
            status = %after.status,
            new_attempts = new_attempts.len(),
            "Job persisted"
        );
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn put(&self, job: &Job) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, status, request, display_name, max_attempts,
                created_at, updated_at, started_at, finished_at,
                last_error, stop_reason, resource
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.status.to_string())
        .bind(serde_json::to_string(&job.request)?)
        .bind(&job.request.display_name)
        .bind(job.request.max_attempts as i64)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.last_error)
        .bind(&job.stop_reason)
        .bind(encode_resource(job.resource.as_ref())?)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("job {} already exists", job.id)),
            other => other,
        })?;

        Self::insert_attempts(&mut tx, &job.id, &job.attempts).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Job> {
        self.load(id).await
    }

    async fn update(&self, id: &str, mutator: JobMutator<'_>) -> Result<Job> {
        let lease = self.lease(id);
        let _guard = lease.lock.lock().await;

        let before = self.load(id).await?;
        let mut after = before.clone();
        mutator(&mut after)?;
        self.write(&before, &after).await?;
        Ok(after)
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let status = status.map(|s| s.to_string());
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM jobs WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at, id",
        )
        .bind(&status)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let attempt_rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT a.* FROM attempts a
            JOIN jobs j ON j.id = a.job_id
            WHERE (?1 IS NULL OR j.status = ?1)
            ORDER BY a.job_id, a.sequence
            "#,
        )
        .bind(&status)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        let mut by_job: HashMap<String, Vec<AttemptRow>> = HashMap::new();
        for attempt in attempt_rows {
            by_job.entry(attempt.job_id.clone()).or_default().push(attempt);
        }

        rows.into_iter()
            .map(|row| {
                let attempts = by_job.remove(&row.id).unwrap_or_default();
                row.into_job(attempts)
            })
            .collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as usize)
    }
}

fn encode_resource(resource: Option<&ResourceHandle>) -> Result<Option<String>> {
    Ok(resource.map(serde_json::to_string).transpose()?)
}

/// SQLite row representation of `jobs`
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    status: String,
    request: String,
    #[allow(dead_code)]
    display_name: String,
    #[allow(dead_code)]
    max_attempts: i64,
    created_at: i64,
    updated_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    last_error: Option<String>,
    stop_reason: Option<String>,
    resource: Option<String>,
}

/// SQLite row representation of `attempts`
#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    job_id: String,
    sequence: i64,
    region: String,
    attempted_at: i64,
    outcome: String,
    message: Option<String>,
}

impl JobRow {
    fn into_job(self, attempts: Vec<AttemptRow>) -> Result<Job> {
        let status: JobStatus = self.status.parse()?;
        let request: ResourceRequest = serde_json::from_str(&self.request)?;
        let resource = self
            .resource
            .as_deref()
            .map(serde_json::from_str::<ResourceHandle>)
            .transpose()?;
        let attempts = attempts
            .into_iter()
            .map(AttemptRow::into_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(Job {
            id: self.id,
            request,
            status,
            attempts,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            last_error: self.last_error,
            stop_reason: self.stop_reason,
            resource,
        })
    }
}

impl AttemptRow {
    fn into_record(self) -> Result<AttemptRecord> {
        let outcome: OutcomeKind = self
            .outcome
            .parse()
            .map_err(|e: String| AppError::Database(format!("corrupt attempt row: {}", e)))?;
        Ok(AttemptRecord {
            sequence: self.sequence as u32,
            region: self.region,
            attempted_at: self.attempted_at,
            outcome,
            message: self.message,
        })
    }
}
