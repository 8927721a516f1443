//! Configuration models and layered config loading.
//!
//! This crate owns the membank config schema, validation, and the
//! layer-merging logic used by the client and the demo CLI.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{
    ConfigLayer, ConfigLayerSource, ENV_ACCESS_TOKEN, ENV_ENGINE, ENV_LOCATION, ENV_PROJECT,
    LayeredConfig, LayeredConfigOptions,
};
/// Configuration schema models.
pub use model::*;
