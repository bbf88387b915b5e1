//! Shared harness: both store implementations, fast backoff, recording notifier

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use provisio_core::application::{BackoffPolicy, ControllerConfig, InMemoryJobStore, JobController};
use provisio_core::domain::JobSnapshot;
use provisio_core::port::id_provider::mocks::SequentialIdProvider;
use provisio_core::port::notifier::mocks::RecordingNotifier;
use provisio_core::port::provisioning_backend::mocks::ScriptedBackend;
use provisio_core::port::JobStore;
use provisio_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};

pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

pub struct Harness {
    pub name: &'static str,
    pub controller: Arc<JobController>,
    pub store: Arc<dyn JobStore>,
    pub backend: Arc<ScriptedBackend>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn sqlite_store() -> Arc<dyn JobStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteJobStore::new(pool))
}

/// One fresh store of each kind
pub async fn stores() -> Vec<(&'static str, Arc<dyn JobStore>)> {
    vec![
        ("memory", Arc::new(InMemoryJobStore::new()) as Arc<dyn JobStore>),
        ("sqlite", sqlite_store().await),
    ]
}

pub fn fast_config(backoff: Duration) -> ControllerConfig {
    ControllerConfig {
        backoff: BackoffPolicy::fixed(backoff),
        attempt_timeout: Duration::from_secs(2),
        notify_timeout: Duration::from_secs(1),
        ..ControllerConfig::default()
    }
}

pub fn harness_on(
    name: &'static str,
    store: Arc<dyn JobStore>,
    backend: ScriptedBackend,
    backoff: Duration,
) -> Harness {
    let backend = Arc::new(backend);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = JobController::builder(store.clone(), backend.clone())
        .notifier(notifier.clone())
        .id_provider(Arc::new(SequentialIdProvider::default()))
        .config(fast_config(backoff))
        .build();

    Harness {
        name,
        controller,
        store,
        backend,
        notifier,
    }
}

/// A harness per store kind, each with its own copy of the backend script
pub async fn harnesses(
    make_backend: impl Fn() -> ScriptedBackend,
    backoff: Duration,
) -> Vec<Harness> {
    stores()
        .await
        .into_iter()
        .map(|(name, store)| harness_on(name, store, make_backend(), backoff))
        .collect()
}

pub async fn wait_terminal(controller: &JobController, job_id: &str) -> JobSnapshot {
    tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            let snapshot = controller.check_status(job_id).await.unwrap();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("job did not reach a terminal state")
}

/// Wait until every spawned loop has exited
pub async fn wait_loops_idle(controller: &JobController) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while controller.active_loops() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("attempt loops did not exit");
}
