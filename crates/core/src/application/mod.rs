// Application Layer - Use Cases and Business Logic

pub mod attempt_executor;
pub mod backoff;
pub mod controller;
pub mod memory_store;
pub mod progress;
pub mod recovery;
pub mod region_catalog;
pub mod validation;

// Re-exports
pub use attempt_executor::{classify, AttemptExecutor};
pub use backoff::BackoffPolicy;
pub use controller::{
    shutdown_channel, ControllerConfig, JobController, JobControllerBuilder, JobStats,
    ShutdownSender, ShutdownToken, StopOutcome,
};
pub use memory_store::InMemoryJobStore;
pub use progress::ProgressPolicy;
pub use recovery::{RecoveryReport, RecoveryService};
pub use region_catalog::RegionCatalog;
pub use validation::validate_request;
