//! Controller guarantees that must hold for every store

mod common;

use std::time::Duration;

use common::{harnesses, wait_loops_idle, wait_terminal};
use provisio_core::application::{RegionCatalog, StopOutcome};
use provisio_core::domain::{JobStatus, Placement, ResourceRequest};
use provisio_core::error::AppError;
use provisio_core::port::provisioning_backend::mocks::{MockBehavior, ScriptedBackend};

#[tokio::test]
async fn test_attempt_bound_holds_under_concurrent_stop() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Capacity).with_delay(Duration::from_millis(2)),
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let mut jobs = Vec::new();
        for i in 0..8u64 {
            let job_id = h
                .controller
                .submit(ResourceRequest::default().with_max_attempts(6))
                .await
                .unwrap();
            jobs.push((job_id, Duration::from_millis(i * 3)));
        }

        let mut stoppers = Vec::new();
        for (job_id, after) in jobs.clone() {
            let controller = h.controller.clone();
            stoppers.push(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                controller.stop(&job_id, None).await.unwrap()
            }));
        }
        for stopper in stoppers {
            let outcome = stopper.await.unwrap();
            assert!(matches!(
                outcome,
                StopOutcome::Acknowledged | StopOutcome::AlreadyTerminal(_)
            ));
        }

        for (job_id, _) in &jobs {
            let snapshot = wait_terminal(&h.controller, job_id).await;
            assert!(snapshot.attempt_count <= 6, "store: {}", h.name);
            assert!(
                matches!(snapshot.status, JobStatus::Stopped | JobStatus::Failed),
                "store: {}: {:?}",
                h.name,
                snapshot.status
            );
            let attempts = h.controller.attempts(job_id, None).await.unwrap();
            assert_eq!(attempts.len() as u32, snapshot.attempt_count);
        }

        wait_loops_idle(&h.controller).await;
        for (job_id, _) in &jobs {
            assert_eq!(h.notifier.count_for(job_id), 1, "store: {}", h.name);
        }
    }
}

#[tokio::test]
async fn test_terminal_state_is_final() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Succeed),
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let job_id = h
            .controller
            .submit(ResourceRequest::default())
            .await
            .unwrap();
        let done = wait_terminal(&h.controller, &job_id).await;
        wait_loops_idle(&h.controller).await;
        assert_eq!(done.status, JobStatus::Succeeded);

        // Repeated stops are acknowledged and change nothing
        for _ in 0..3 {
            let outcome = h.controller.stop(&job_id, Some("late".into())).await.unwrap();
            assert_eq!(outcome, StopOutcome::AlreadyTerminal(JobStatus::Succeeded));
        }

        let after = h.controller.check_status(&job_id).await.unwrap();
        assert_eq!(after, done, "store: {}", h.name);
        assert_eq!(h.notifier.count_for(&job_id), 1);
        assert_eq!(h.backend.call_count(), 1);
    }
}

#[tokio::test]
async fn test_stop_is_idempotent_on_live_job() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Capacity),
        Duration::from_millis(500),
    )
    .await;

    for h in hs {
        let job_id = h
            .controller
            .submit(ResourceRequest::default())
            .await
            .unwrap();

        let first = h.controller.stop(&job_id, Some("first".into())).await.unwrap();
        assert_eq!(first, StopOutcome::Acknowledged);
        let _ = h.controller.stop(&job_id, Some("second".into())).await.unwrap();

        let snapshot = wait_terminal(&h.controller, &job_id).await;
        wait_loops_idle(&h.controller).await;
        assert_eq!(snapshot.status, JobStatus::Stopped);
        assert_eq!(snapshot.stop_reason.as_deref(), Some("first"), "store: {}", h.name);
        assert_eq!(h.notifier.count_for(&job_id), 1);
    }
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Succeed),
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let status = h.controller.check_status("vm-job-missing").await;
        assert!(matches!(status, Err(AppError::NotFound(_))), "store: {}", h.name);

        let stop = h.controller.stop("vm-job-missing", None).await;
        assert!(matches!(stop, Err(AppError::NotFound(_))), "store: {}", h.name);

        let attempts = h.controller.attempts("vm-job-missing", Some(5)).await;
        assert!(matches!(attempts, Err(AppError::NotFound(_))));
    }
}

#[tokio::test]
async fn test_jobs_do_not_interfere() {
    let hs = harnesses(
        || {
            ScriptedBackend::new(
                vec![MockBehavior::Fatal("NotAuthorizedOrNotFound".into())],
                MockBehavior::Succeed,
            )
        },
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let first = h
            .controller
            .submit(ResourceRequest::default())
            .await
            .unwrap();
        let first = wait_terminal(&h.controller, &first).await;

        let second = h
            .controller
            .submit(ResourceRequest::default())
            .await
            .unwrap();
        let second = wait_terminal(&h.controller, &second).await;

        assert_eq!(first.status, JobStatus::Failed, "store: {}", h.name);
        assert_eq!(second.status, JobStatus::Succeeded, "store: {}", h.name);

        let stats = h.controller.stats().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.total(), 2);
    }
}

#[test]
fn test_ranking_is_deterministic() {
    let catalog = RegionCatalog::seeded();
    let first = catalog.rank(&Placement::Any).unwrap();
    for _ in 0..10 {
        assert_eq!(catalog.rank(&Placement::Any).unwrap(), first);
    }

    let regions: Vec<_> = first.iter().map(|c| c.region.as_str()).collect();
    assert_eq!(regions[0], "us-phoenix-1");

    let ordered = Placement::Ordered(vec!["ap-seoul-1".into(), "ap-tokyo-1".into()]);
    let ranked = catalog.rank(&ordered).unwrap();
    assert_eq!(ranked[0].region, "ap-seoul-1");
    assert_eq!(ranked[1].region, "ap-tokyo-1");
}
