// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Attempt limit reached: {max_attempts}")]
    AttemptLimitReached { max_attempts: u32 },

    #[error("Attempt sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u32, actual: u32 },

    #[error("Job already terminal: {0}")]
    AlreadyTerminal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
