//! SDK Error Types

use thiserror::Error;

/// SDK Result type
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK Error
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("RPC error ({code}): {message}")]
    Rpc { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out waiting for job {0}")]
    WaitTimeout(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Server error codes
pub mod code {
    pub const INVALID_CONFIGURATION: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const THROTTLED: i32 = 4003;
}

impl SdkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::Rpc { code, .. } if *code == code::NOT_FOUND)
    }

    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, SdkError::Rpc { code, .. } if *code == code::INVALID_CONFIGURATION)
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, SdkError::Rpc { code, .. } if *code == code::THROTTLED)
    }
}

impl From<jsonrpsee::core::ClientError> for SdkError {
    fn from(e: jsonrpsee::core::ClientError) -> Self {
        match e {
            jsonrpsee::core::ClientError::Call(call_err) => SdkError::Rpc {
                code: call_err.code(),
                message: call_err.message().to_string(),
            },
            jsonrpsee::core::ClientError::Transport(e) => {
                SdkError::Transport(format!("Transport error: {}", e))
            }
            jsonrpsee::core::ClientError::RestartNeeded(_) => {
                SdkError::Connection("Connection restart needed".to_string())
            }
            jsonrpsee::core::ClientError::ParseError(e) => SdkError::Serialization(e),
            _ => SdkError::Other(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let err = SdkError::Rpc {
            code: 4001,
            message: "Not found: job x".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_throttled());
        assert!(err.to_string().contains("4001"));
    }
}
