// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_store;
pub mod notifier;
pub mod provisioning_backend;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_store::{JobMutator, JobStore};
pub use notifier::{
    CompositeNotifier, LogNotifier, Notification, Notifier, NotifyError, ProgressEvent, ProgressUpdate,
};
pub use provisioning_backend::{ProviderError, ProviderErrorKind, ProvisioningBackend};
pub use time_provider::TimeProvider;
