// Provisio Infrastructure - Provisioning Backends
// Implements: ProvisioningBackend

pub mod simulated_backend;
pub mod subprocess_backend;

pub use simulated_backend::SimulatedBackend;
pub use subprocess_backend::{SubprocessBackend, SubprocessConfig};
