// Provisioning Backend Port
// Abstraction over whatever actually launches instances (provider CLI, SDK, simulator)

use crate::domain::{PlacementCandidate, ResourceHandle, ResourceRequest};
use async_trait::async_trait;
use thiserror::Error;

/// Where a provider failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The provider answered with an error (status and/or code set)
    Service,
    /// No answer within the deadline
    Timeout,
    /// Connection-level failure
    Network,
    /// The local launcher could not be started at all
    Launcher,
    /// The provider answered success but the payload was unusable
    InvalidResponse,
}

/// Raw, provider-specific failure; the attempt executor classifies it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// HTTP-like status reported by the provider
    pub status: Option<u16>,
    /// Provider error code ("OutOfHostCapacity", "NotAuthenticated", ...)
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn service(status: Option<u16>, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Service,
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// The classic "no capacity" answer (reported as HTTP 500)
    pub fn out_of_capacity() -> Self {
        Self::service(Some(500), Some("InternalError"), "Out of host capacity.")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::of_kind(ProviderErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::of_kind(ProviderErrorKind::Network, message)
    }

    pub fn launcher(message: impl Into<String>) -> Self {
        Self::of_kind(ProviderErrorKind::Launcher, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::of_kind(ProviderErrorKind::InvalidResponse, message)
    }

    fn of_kind(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

/// Provisioning backend trait
///
/// Implementations:
/// - SubprocessBackend: runs a launcher command per attempt
/// - SimulatedBackend: random outcomes weighted by region success rate
///
/// One call is one attempt; implementations must not retry internally.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn launch(
        &self,
        candidate: &PlacementCandidate,
        request: &ResourceRequest,
    ) -> Result<ResourceHandle, ProviderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock backend behavior for one call
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed,
        Capacity,
        Transient(String),
        Fatal(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Backend that plays a script, then repeats a fallback forever
    pub struct ScriptedBackend {
        script: Arc<Mutex<VecDeque<MockBehavior>>>,
        fallback: MockBehavior,
        delay: Duration,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        pub fn new(script: Vec<MockBehavior>, fallback: MockBehavior) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                fallback,
                delay: Duration::ZERO,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn always(behavior: MockBehavior) -> Self {
            Self::new(Vec::new(), behavior)
        }

        /// Make every call take this long (to keep an attempt in flight)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Regions attempted, in call order
        pub fn regions_called(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProvisioningBackend for ScriptedBackend {
        async fn launch(
            &self,
            candidate: &PlacementCandidate,
            request: &ResourceRequest,
        ) -> Result<ResourceHandle, ProviderError> {
            self.calls.lock().unwrap().push(candidate.region.clone());

            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match behavior {
                MockBehavior::Succeed => Ok(ResourceHandle::new(
                    format!("ocid1.instance.mock.{}", self.call_count()),
                    candidate.region.clone(),
                    request.display_name.clone(),
                )),
                MockBehavior::Capacity => Err(ProviderError::out_of_capacity()),
                MockBehavior::Transient(msg) => Err(ProviderError::network(msg)),
                MockBehavior::Fatal(msg) => {
                    Err(ProviderError::service(Some(401), Some("NotAuthenticated"), msg))
                }
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
