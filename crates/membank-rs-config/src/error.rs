//! Error types for config loading and validation.

use thiserror::Error;

/// Why a membank config could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer file could not be read.
    #[error("failed to read membank config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A layer is not valid JSON5.
    #[error("membank config is not valid JSON5: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged value does not fit the schema types.
    #[error("failed to decode membank config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A field at `path` was rejected.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A value needed by the caller is not set in any layer.
    #[error("missing required config value: {0}")]
    Missing(&'static str),
}
