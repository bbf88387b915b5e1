// Attempt executor: one guarded provisioning call plus error classification
use crate::domain::{AttemptOutcome, OutcomeKind, PlacementCandidate, ResourceRequest};
use crate::port::{ProviderError, ProviderErrorKind, ProvisioningBackend};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Default upper bound for a single provisioning call
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

const CAPACITY_CODES: &[&str] = &["OutOfHostCapacity", "OutOfCapacity", "InsufficientCapacity"];
const CAPACITY_PHRASES: &[&str] = &[
    "out of host capacity",
    "out of capacity",
    "insufficient capacity",
];
const FATAL_CODES: &[&str] = &[
    "NotAuthenticated",
    "NotAuthorizedOrNotFound",
    "LimitExceeded",
    "QuotaExceeded",
    "InvalidParameter",
];
const FATAL_STATUSES: &[u16] = &[400, 401, 403, 404];

/// Map a provider failure to an outcome class
///
/// Capacity is checked first: the provider reports it as HTTP 500, which
/// would otherwise read as a transient server error.
pub fn classify(err: &ProviderError) -> OutcomeKind {
    let code = err.code.as_deref().unwrap_or_default();
    let message = err.message.to_lowercase();

    if CAPACITY_CODES.contains(&code) || CAPACITY_PHRASES.iter().any(|p| message.contains(p)) {
        return OutcomeKind::CapacityUnavailable;
    }

    match err.kind {
        ProviderErrorKind::Timeout | ProviderErrorKind::Network => {
            return OutcomeKind::TransientError
        }
        // A launcher that cannot start will not start on the next try either
        ProviderErrorKind::Launcher => return OutcomeKind::FatalError,
        ProviderErrorKind::Service | ProviderErrorKind::InvalidResponse => {}
    }

    if let Some(status) = err.status {
        if status == 429 || (500..600).contains(&status) {
            return OutcomeKind::TransientError;
        }
    }

    if FATAL_CODES.contains(&code) || err.status.is_some_and(|s| FATAL_STATUSES.contains(&s)) {
        return OutcomeKind::FatalError;
    }

    OutcomeKind::TransientError
}

/// Turn a backend result into an attempt outcome
pub fn to_outcome(result: Result<crate::domain::ResourceHandle, ProviderError>) -> AttemptOutcome {
    match result {
        Ok(handle) => AttemptOutcome::Succeeded(handle),
        Err(err) => {
            let message = describe(&err);
            match classify(&err) {
                OutcomeKind::CapacityUnavailable => AttemptOutcome::CapacityUnavailable(message),
                OutcomeKind::FatalError => AttemptOutcome::FatalError(message),
                OutcomeKind::TransientError | OutcomeKind::Succeeded => {
                    AttemptOutcome::TransientError(message)
                }
            }
        }
    }
}

fn describe(err: &ProviderError) -> String {
    match (err.status, err.code.as_deref()) {
        (Some(status), Some(code)) => format!("{} ({} {})", err.message, status, code),
        (Some(status), None) => format!("{} ({})", err.message, status),
        (None, Some(code)) => format!("{} ({})", err.message, code),
        (None, None) => err.message.clone(),
    }
}

/// Runs exactly one attempt against the backend
///
/// The call runs in its own task under a timeout: a hung backend yields
/// `TransientError`, a panicking one `FatalError`. Jobs are never touched.
pub struct AttemptExecutor {
    backend: Arc<dyn ProvisioningBackend>,
    attempt_timeout: Duration,
}

impl AttemptExecutor {
    pub fn new(backend: Arc<dyn ProvisioningBackend>, attempt_timeout: Duration) -> Self {
        Self {
            backend,
            attempt_timeout,
        }
    }

    pub async fn execute(
        &self,
        candidate: &PlacementCandidate,
        request: &ResourceRequest,
    ) -> AttemptOutcome {
        let backend = Arc::clone(&self.backend);
        let task_candidate = candidate.clone();
        let task_request = request.clone();
        let handle = tokio::spawn(async move {
            backend.launch(&task_candidate, &task_request).await
        });
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.attempt_timeout, handle).await {
            Ok(Ok(result)) => to_outcome(result),
            Ok(Err(join_err)) if join_err.is_panic() => {
                let panic_msg = panic_message(join_err.into_panic());
                error!(region = %candidate.region, panic_msg = %panic_msg, "Provisioning backend panicked");
                AttemptOutcome::FatalError(format!("backend panicked: {}", panic_msg))
            }
            Ok(Err(join_err)) => {
                warn!(region = %candidate.region, error = %join_err, "Attempt task cancelled");
                AttemptOutcome::TransientError(format!("attempt cancelled: {}", join_err))
            }
            Err(_) => {
                abort.abort();
                warn!(
                    region = %candidate.region,
                    timeout_ms = self.attempt_timeout.as_millis() as u64,
                    "Attempt timed out"
                );
                AttemptOutcome::TransientError(format!(
                    "attempt timed out after {}ms",
                    self.attempt_timeout.as_millis()
                ))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LatencyClass;
    use crate::port::provisioning_backend::mocks::{MockBehavior, ScriptedBackend};

    fn candidate() -> PlacementCandidate {
        PlacementCandidate {
            region: "ap-tokyo-1".to_string(),
            success_rate: 0.75,
            latency: LatencyClass::Low,
        }
    }

    #[test]
    fn test_capacity_wins_over_server_error() {
        let err = ProviderError::service(Some(500), Some("InternalError"), "Out of host capacity.");
        assert_eq!(classify(&err), OutcomeKind::CapacityUnavailable);

        let err = ProviderError::service(Some(500), Some("OutOfCapacity"), "try later");
        assert_eq!(classify(&err), OutcomeKind::CapacityUnavailable);
    }

    #[test]
    fn test_transient_classes() {
        assert_eq!(
            classify(&ProviderError::service(Some(429), Some("TooManyRequests"), "slow down")),
            OutcomeKind::TransientError
        );
        assert_eq!(
            classify(&ProviderError::service(Some(503), None, "unavailable")),
            OutcomeKind::TransientError
        );
        assert_eq!(classify(&ProviderError::timeout("no answer")), OutcomeKind::TransientError);
        assert_eq!(classify(&ProviderError::network("reset")), OutcomeKind::TransientError);
    }

    #[test]
    fn test_fatal_classes() {
        assert_eq!(
            classify(&ProviderError::service(Some(401), Some("NotAuthenticated"), "bad key")),
            OutcomeKind::FatalError
        );
        assert_eq!(
            classify(&ProviderError::service(None, Some("QuotaExceeded"), "quota")),
            OutcomeKind::FatalError
        );
        assert_eq!(
            classify(&ProviderError::service(Some(404), None, "no such shape")),
            OutcomeKind::FatalError
        );
    }

    #[test]
    fn test_unclassified_is_transient() {
        assert_eq!(
            classify(&ProviderError::service(None, None, "something odd")),
            OutcomeKind::TransientError
        );
        assert_eq!(
            classify(&ProviderError::service(Some(409), Some("Conflict"), "busy")),
            OutcomeKind::TransientError
        );
    }

    #[tokio::test]
    async fn test_execute_success() {
        let executor = AttemptExecutor::new(
            Arc::new(ScriptedBackend::always(MockBehavior::Succeed)),
            Duration::from_secs(1),
        );
        let outcome = executor.execute(&candidate(), &ResourceRequest::default()).await;
        match outcome {
            AttemptOutcome::Succeeded(handle) => assert_eq!(handle.region, "ap-tokyo-1"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_backend_is_fatal() {
        let executor = AttemptExecutor::new(
            Arc::new(ScriptedBackend::always(MockBehavior::Panic("boom".into()))),
            Duration::from_secs(1),
        );
        let outcome = executor.execute(&candidate(), &ResourceRequest::default()).await;
        assert_eq!(outcome.kind(), OutcomeKind::FatalError);
        assert!(outcome.message().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_as_transient() {
        let backend = ScriptedBackend::always(MockBehavior::Succeed)
            .with_delay(Duration::from_millis(500));
        let executor = AttemptExecutor::new(Arc::new(backend), Duration::from_millis(20));
        let outcome = executor.execute(&candidate(), &ResourceRequest::default()).await;
        assert_eq!(outcome.kind(), OutcomeKind::TransientError);
    }
}
