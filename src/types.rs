//! Error types for dashlink

/// Main error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum DashlinkError {
    /// A correlated request saw no response before its deadline.
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DashlinkError {
    /// True for the timeout failure of a correlated request.
    ///
    /// Callers that retry or degrade on unanswered requests branch on this
    /// rather than matching the whole enum.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<std::io::Error> for DashlinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, DashlinkError>;
