//! End-to-end acquisition scenarios, run against every store implementation

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harnesses, wait_loops_idle, wait_terminal};
use provisio_core::application::JobController;
use provisio_core::domain::{
    JobStatus, OutcomeKind, ResourceRequest, ResourceShape, TerminalStatus,
};
use provisio_core::port::provisioning_backend::mocks::{MockBehavior, ScriptedBackend};
use provisio_infra_system::SimulatedBackend;

/// Scenario A: capacity never frees up, the budget runs out
#[tokio::test]
async fn scenario_a_exhaustion_fails_with_full_history() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Capacity),
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let job_id = h
            .controller
            .submit(ResourceRequest::in_region("us-phoenix-1").with_max_attempts(3))
            .await
            .unwrap();

        let snapshot = wait_terminal(&h.controller, &job_id).await;
        wait_loops_idle(&h.controller).await;

        assert_eq!(snapshot.status, JobStatus::Failed, "store: {}", h.name);
        assert_eq!(snapshot.attempt_count, 3, "store: {}", h.name);
        assert!(snapshot
            .last_error
            .as_deref()
            .unwrap()
            .contains("capacity"));

        let attempts = h.controller.attempts(&job_id, None).await.unwrap();
        assert_eq!(attempts.len(), 3);
        assert!(attempts
            .iter()
            .all(|a| a.outcome == OutcomeKind::CapacityUnavailable));
        assert_eq!(
            attempts.iter().map(|a| a.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        assert_eq!(h.notifier.count_for(&job_id), 1, "store: {}", h.name);
        assert_eq!(h.notifier.received()[0].status, TerminalStatus::Failed);
        assert_eq!(h.backend.call_count(), 3);
    }
}

/// Scenario B: capacity appears on the third attempt
#[tokio::test]
async fn scenario_b_success_after_capacity_errors() {
    let hs = harnesses(
        || {
            ScriptedBackend::new(
                vec![MockBehavior::Capacity, MockBehavior::Capacity],
                MockBehavior::Succeed,
            )
        },
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let job_id = h
            .controller
            .submit(ResourceRequest::in_region("ap-tokyo-1").with_max_attempts(5))
            .await
            .unwrap();

        let snapshot = wait_terminal(&h.controller, &job_id).await;
        wait_loops_idle(&h.controller).await;

        assert_eq!(snapshot.status, JobStatus::Succeeded, "store: {}", h.name);
        assert_eq!(snapshot.attempt_count, 3);
        assert_eq!(snapshot.resource.as_ref().unwrap().region, "ap-tokyo-1");

        let attempts = h.controller.attempts(&job_id, None).await.unwrap();
        let outcomes: Vec<_> = attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                OutcomeKind::CapacityUnavailable,
                OutcomeKind::CapacityUnavailable,
                OutcomeKind::Succeeded,
            ]
        );

        let received = h.notifier.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].status, TerminalStatus::Succeeded);
        assert!(received[0].resource.is_some());
    }
}

/// Scenario C: stop right after submit
#[tokio::test]
async fn scenario_c_immediate_stop() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Capacity).with_delay(Duration::from_millis(20)),
        Duration::from_millis(200),
    )
    .await;

    for h in hs {
        let job_id = h
            .controller
            .submit(ResourceRequest::default())
            .await
            .unwrap();
        h.controller
            .stop(&job_id, Some("changed my mind".into()))
            .await
            .unwrap();

        let snapshot = wait_terminal(&h.controller, &job_id).await;
        wait_loops_idle(&h.controller).await;

        assert_eq!(snapshot.status, JobStatus::Stopped, "store: {}", h.name);
        assert!(snapshot.attempt_count <= 1, "store: {}", h.name);
        assert_eq!(snapshot.stop_reason.as_deref(), Some("changed my mind"));
        assert_eq!(h.notifier.count_for(&job_id), 1);
        assert_eq!(h.notifier.received()[0].status, TerminalStatus::Stopped);
    }
}

/// Scenario D: the provider rejects the request outright
#[tokio::test]
async fn scenario_d_fatal_error_ends_job_immediately() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Fatal("NotAuthenticated".into())),
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let job_id = h
            .controller
            .submit(ResourceRequest::default().with_max_attempts(1000))
            .await
            .unwrap();

        let snapshot = wait_terminal(&h.controller, &job_id).await;
        wait_loops_idle(&h.controller).await;

        assert_eq!(snapshot.status, JobStatus::Failed, "store: {}", h.name);
        assert_eq!(snapshot.attempt_count, 1);
        let attempts = h.controller.attempts(&job_id, None).await.unwrap();
        assert_eq!(attempts[0].outcome, OutcomeKind::FatalError);
        assert_eq!(h.backend.call_count(), 1);
        assert_eq!(h.notifier.count_for(&job_id), 1);
    }
}

/// Scenario E: shape outside the provider's bounds
#[tokio::test]
async fn scenario_e_invalid_shape_creates_nothing() {
    let hs = harnesses(
        || ScriptedBackend::always(MockBehavior::Succeed),
        Duration::from_millis(1),
    )
    .await;

    for h in hs {
        let request = ResourceRequest::default().with_shape(ResourceShape {
            ocpus: 8,
            memory_gb: 12,
            storage_gb: 50,
        });

        let err = h.controller.submit(request).await.unwrap_err();
        assert!(err.is_invalid_configuration(), "store: {}: {}", h.name, err);

        assert!(h.store.list(None).await.unwrap().is_empty());
        assert_eq!(h.controller.active_loops(), 0);
        assert_eq!(h.backend.call_count(), 0);
        assert!(h.notifier.received().is_empty());
    }
}

/// The daemon's default backend drives the same state machine
#[tokio::test]
async fn simulated_backend_runs_to_both_outcomes() {
    for (name, store) in common::stores().await {
        // success_rate * 2.0 saturates at certainty
        let lucky = JobController::builder(store.clone(), Arc::new(SimulatedBackend::new(Some(7), 2.0)))
            .config(common::fast_config(Duration::from_millis(1)))
            .build();
        let job_id = lucky
            .submit(ResourceRequest::in_region("us-phoenix-1"))
            .await
            .unwrap();
        let snapshot = wait_terminal(&lucky, &job_id).await;
        assert_eq!(snapshot.status, JobStatus::Succeeded, "store: {}", name);
        let resource = snapshot.resource.unwrap();
        assert!(resource.resource_id.starts_with("ocid1.instance.oc1.us-phoenix-1."));
        assert!(resource.private_ip.is_some());

        let starved = JobController::builder(store, Arc::new(SimulatedBackend::new(Some(7), 0.0)))
            .config(common::fast_config(Duration::from_millis(1)))
            .build();
        let job_id = starved
            .submit(ResourceRequest::in_region("ap-seoul-1").with_max_attempts(4))
            .await
            .unwrap();
        let snapshot = wait_terminal(&starved, &job_id).await;
        assert_eq!(snapshot.status, JobStatus::Failed, "store: {}", name);
        assert_eq!(snapshot.attempt_count, 4);
        let attempts = starved.attempts(&job_id, None).await.unwrap();
        assert!(attempts
            .iter()
            .all(|a| a.outcome == OutcomeKind::CapacityUnavailable));
    }
}
