//! Layered loading of `membank.json5`.
//!
//! Files are read from well-known locations, checked against the schema one
//! by one, merged in precedence order with environment variables last, and
//! validated once more as a whole.

mod env;
mod merge;
mod schema;
mod stack;

#[cfg(test)]
mod tests;

pub use env::{ENV_ACCESS_TOKEN, ENV_ENGINE, ENV_LOCATION, ENV_PROJECT};

use crate::{ConfigError, MembankConfig};
use log::{debug, info};
use serde_json::Value;
use stack::LayerStack;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "membank.json5";
/// Holds the user layer under the home dir and the repo layer under the project root.
const DEFAULT_CONFIG_DIR: &str = ".membank";
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: &str = "/etc/membank/membank.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\membank\\membank.json5";

/// Result of a layered load.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: MembankConfig,
    /// Layers that contributed, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// `/etc/membank/membank.json5`.
    System,
    /// `~/.membank/membank.json5`.
    User,
    /// `membank.json5` at the project root.
    Project,
    /// `membank.json5` in the working directory.
    Cwd,
    /// `.membank/membank.json5` at the project root.
    Repo,
    /// Files named explicitly, e.g. `--config`.
    Runtime,
    /// Recognised environment variables.
    Env,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    /// `None` for the environment layer.
    pub path: Option<PathBuf>,
}

/// Where to look for layers, plus the environment snapshot to apply.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Anchor for the cwd, project, and repo layers.
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    /// Required files applied above every discovered layer.
    pub runtime_paths: Vec<PathBuf>,
    /// Entries whose presence marks a directory as the project root.
    pub project_root_markers: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LayeredConfigOptions {
    /// Default locations relative to `cwd` and a snapshot of the process
    /// environment.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: stack::default_system_config_path(),
            user_config_path: stack::default_user_config_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .copied()
                .map(String::from)
                .collect(),
            env: env::capture_process_env(),
        }
    }

    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().into());
        self
    }

    /// Use `vars` instead of the process environment.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }
}

impl MembankConfig {
    /// Read one file as the whole config, without layering or env overrides.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config file (path={})", path.display());
        Self::load_from_str(&fs::read_to_string(path)?)
    }

    /// Parse JSON5 `contents` as the whole config.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("parsing config (len={})", contents.len());
        config_from_value(json5::from_str(contents)?, "config")
    }

    /// Layered load from the default locations around `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!("loading layered config (cwd={})", cwd.as_ref().display());
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Layered load from explicit locations. Later layers win: system, user,
    /// project, cwd, repo, runtime files, then the environment.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = stack::canonical(&options.cwd);
        debug!("resolved cwd for config load: {}", cwd.display());
        let mut stack = LayerStack::default();

        for (source, path) in [
            (ConfigLayerSource::System, &options.system_config_path),
            (ConfigLayerSource::User, &options.user_config_path),
        ] {
            if let Some(path) = path {
                stack.push_file(source, path)?;
            }
        }

        let project_root = stack::project_root(&cwd, &options.project_root_markers);
        match &project_root {
            Some(root) => {
                debug!("resolved project root: {}", root.display());
                stack.push_file(ConfigLayerSource::Project, &root.join(DEFAULT_CONFIG_FILE))?;
            }
            None => debug!("project root not found; skipping project/repo layers"),
        }
        stack.push_file(ConfigLayerSource::Cwd, &cwd.join(DEFAULT_CONFIG_FILE))?;
        if let Some(root) = &project_root {
            let repo = root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE);
            stack.push_file(ConfigLayerSource::Repo, &repo)?;
        }

        for runtime_path in &options.runtime_paths {
            debug!("loading runtime layer (path={})", runtime_path.display());
            stack.push_required(ConfigLayerSource::Runtime, runtime_path)?;
        }

        if let Some(loaded) = env::env_layer(&options.env) {
            debug!("applying environment overrides");
            stack.push(loaded);
        }

        let (layers, merged) = stack.merge();
        let config = config_from_value(merged, "effective")?;
        info!("config ready (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Cross-field checks the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.location.is_empty() {
            return Err(invalid("location", "must not be empty"));
        }
        if self.api.version.is_empty() {
            return Err(invalid("api.version", "must not be empty"));
        }

        let polling = &self.polling;
        if polling.initial_interval_ms == 0 {
            return Err(invalid("polling.initial_interval_ms", "must be positive"));
        }
        if polling.multiplier < 1.0 {
            return Err(invalid("polling.multiplier", "must be at least 1.0"));
        }
        if polling.max_interval_ms < polling.initial_interval_ms {
            return Err(invalid(
                "polling.max_interval_ms",
                "must not be below initial_interval_ms",
            ));
        }
        if polling.timeout_ms == 0 {
            return Err(invalid("polling.timeout_ms", "must be positive"));
        }

        let mut labels = HashSet::new();
        for (idx, topic) in self.engine_setup.custom_topics.iter().enumerate() {
            let path = format!("engine_setup.custom_topics[{idx}].label");
            if topic.label.trim().is_empty() {
                return Err(invalid(&path, "must not be empty"));
            }
            if !labels.insert(topic.label.as_str()) {
                return Err(invalid(&path, "duplicate custom topic label"));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn invalid(path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn config_from_value(value: Value, label: &str) -> Result<MembankConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: MembankConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
