//! Configuration schema for membank.

use crate::ConfigError;
use membank_rs_protocol::{EngineName, LocationName};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root config for the memory bank client and demo CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembankConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    /// Cloud project id.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    /// Agent engine id or fully-qualified reasoning engine name.
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub engine_setup: EngineSetupConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl Default for MembankConfig {
    fn default() -> Self {
        Self {
            schema: None,
            project: None,
            location: default_location(),
            engine: None,
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            polling: PollingConfig::default(),
            engine_setup: EngineSetupConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

fn default_location() -> String {
    "us-central1".to_string()
}

impl MembankConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MembankConfigBuilder {
        MembankConfigBuilder::new()
    }

    /// Project and location as a resource name; the project is required.
    pub fn location_name(&self) -> Result<LocationName, ConfigError> {
        let project = self
            .project
            .as_deref()
            .filter(|project| !project.is_empty())
            .ok_or(ConfigError::Missing("project"))?;
        Ok(LocationName::new(project, &self.location))
    }

    /// Configured engine, accepting either a bare id or a full name.
    pub fn engine_name(&self) -> Result<EngineName, ConfigError> {
        let engine = self
            .engine
            .as_deref()
            .filter(|engine| !engine.is_empty())
            .ok_or(ConfigError::Missing("engine"))?;
        if engine.contains('/') {
            return engine.parse().map_err(|err| ConfigError::InvalidField {
                path: "engine".to_string(),
                message: format!("{err}"),
            });
        }
        Ok(self.location_name()?.engine(engine))
    }
}

impl Default for MembankConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for assembling a `MembankConfig` in code.
#[derive(Debug, Clone)]
pub struct MembankConfigBuilder {
    config: MembankConfig,
}

impl MembankConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MembankConfig::default(),
        }
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.config.project = Some(project.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.config.engine = Some(engine.into());
        self
    }

    /// Replace the API endpoint configuration.
    pub fn api(mut self, api: ApiConfig) -> Self {
        self.config.api = api;
        self
    }

    /// Replace the authentication configuration.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Replace the operation polling configuration.
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.config.polling = polling;
        self
    }

    pub fn engine_setup(mut self, engine_setup: EngineSetupConfig) -> Self {
        self.config.engine_setup = engine_setup;
        self
    }

    /// Finalize and return the built `MembankConfig`.
    pub fn build(self) -> MembankConfig {
        self.config
    }
}

/// REST endpoint selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// Overrides `https://{location}-aiplatform.googleapis.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_api_version")]
    pub version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            version: default_api_version(),
        }
    }
}

fn default_api_version() -> String {
    "v1beta1".to_string()
}

impl ApiConfig {
    /// Base URL including the API version, always ending with `/`.
    pub fn base_url(&self, location: &str) -> String {
        let endpoint = self
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com"));
        format!("{}/{}/", endpoint.trim_end_matches('/'), self.version)
    }
}

/// Where access tokens come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthSource {
    /// Configured token, then the metadata server, then gcloud.
    #[default]
    Auto,
    Static,
    Gcloud,
    Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AuthConfig {
    #[serde(default)]
    pub source: AuthSource,
    #[serde(default)]
    pub token: Option<String>,
}

/// Backoff used while waiting on long-running operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PollingConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_initial_interval_ms() -> u64 {
    1_000
}

fn default_max_interval_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_timeout_ms() -> u64 {
    300_000
}

/// Context applied by the demo `setup` step.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EngineSetupConfig {
    /// Embedding model id, e.g. `text-embedding-005`.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub custom_topics: Vec<CustomTopicConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomTopicConfig {
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoConfig {
    #[serde(default = "default_demo_user")]
    pub user_id: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            user_id: default_demo_user(),
        }
    }
}

fn default_demo_user() -> String {
    "demo-user".to_string()
}
