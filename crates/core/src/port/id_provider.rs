// ID Provider Port (for deterministic testing)

/// Prefix carried by every generated job ID
pub const JOB_ID_PREFIX: &str = "vm-job-";

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique job ID; never returns the same value twice
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        format!("{}{}", JOB_ID_PREFIX, uuid::Uuid::new_v4())
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic IDs: vm-job-1, vm-job-2, ...
    #[derive(Default)]
    pub struct SequentialIdProvider {
        next: AtomicU64,
    }

    impl IdProvider for SequentialIdProvider {
        fn generate_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}{}", JOB_ID_PREFIX, n)
        }
    }
}
