//! Error types for memory bank operations.

use membank_rs_config::ConfigError;
use membank_rs_protocol::{FilterError, NameError};

/// Errors returned by the memory bank client and service implementations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryBankError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),
    /// The request was rejected as malformed, locally or by the service (HTTP 400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Credentials were missing or lacked permission (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Any other non-success HTTP status.
    #[error("service returned HTTP {code}: {message}")]
    Status { code: u16, message: String },
    /// A long-running operation finished with an error.
    #[error("operation failed (code={code}): {message}")]
    Operation { code: i32, message: String },
    /// The operation was still running when the caller's timeout elapsed.
    #[error("timed out waiting for operation {0}")]
    Timeout(String),
    /// The caller cancelled the wait.
    #[error("cancelled while waiting for operation {0}")]
    Cancelled(String),
    /// Transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// No access token could be obtained.
    #[error("auth error: {0}")]
    Auth(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MemoryBankError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether the error means the resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias used across the client.
pub type Result<T, E = MemoryBankError> = std::result::Result<T, E>;
