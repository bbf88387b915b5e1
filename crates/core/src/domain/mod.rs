// Domain Layer - Pure business logic and entities

pub mod attempt;
pub mod error;
pub mod job;
pub mod region;
pub mod request;

// Re-exports
pub use attempt::{AttemptOutcome, AttemptRecord, OutcomeKind, ResourceHandle};
pub use error::DomainError;
pub use job::{Job, JobId, JobSnapshot, JobStatus, TerminalStatus};
pub use region::{LatencyClass, PlacementCandidate, RegionId, RegionInfo};
pub use request::{Bound, Placement, ResourceRequest, ResourceShape, ShapeBounds};
