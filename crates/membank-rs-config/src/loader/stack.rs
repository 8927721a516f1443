//! File discovery and the ordered stack of loaded layers.

use super::merge::merge_json_values;
use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer, schema,
};
use crate::ConfigError;
use directories::BaseDirs;
use log::debug;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Layers in ascending precedence. Each file is read at most once, so a cwd
/// that is also the project root does not apply twice.
#[derive(Default)]
pub(super) struct LayerStack {
    layers: Vec<LoadedLayer>,
    seen: HashSet<PathBuf>,
}

impl LayerStack {
    /// Push the file at `path` if it exists and has not been read yet.
    pub(super) fn push_file(
        &mut self,
        source: ConfigLayerSource,
        path: &Path,
    ) -> Result<(), ConfigError> {
        if !self.seen.insert(canonical(path)) {
            debug!("skipping duplicate layer (source={source:?}, path={})", path.display());
            return Ok(());
        }
        match read_layer(source, path) {
            Ok(layer) => {
                self.layers.push(layer);
                Ok(())
            }
            Err(ConfigError::ReadFailed(err)) if err.kind() == ErrorKind::NotFound => {
                debug!("no layer at {} (source={source:?})", path.display());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Push a file the caller asked for explicitly; it must exist.
    pub(super) fn push_required(
        &mut self,
        source: ConfigLayerSource,
        path: &Path,
    ) -> Result<(), ConfigError> {
        self.seen.insert(canonical(path));
        self.layers.push(read_layer(source, path)?);
        Ok(())
    }

    pub(super) fn push(&mut self, layer: LoadedLayer) {
        self.layers.push(layer);
    }

    /// Layer metadata plus the values merged in precedence order.
    pub(super) fn merge(self) -> (Vec<ConfigLayer>, Value) {
        let mut merged = Value::Object(Map::new());
        let mut metas = Vec::with_capacity(self.layers.len());
        for layer in self.layers {
            merge_json_values(&mut merged, &layer.value);
            metas.push(layer.meta);
        }
        (metas, merged)
    }
}

fn read_layer(source: ConfigLayerSource, path: &Path) -> Result<LoadedLayer, ConfigError> {
    let contents = fs::read_to_string(path)?;
    debug!("read layer (source={source:?}, path={})", path.display());
    let value: Value = json5::from_str(&contents)?;
    let label = format!("{}({})", source_name(source), path.display());
    schema::validate_layer_schema(&value, &label)?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    })
}

fn source_name(source: ConfigLayerSource) -> &'static str {
    match source {
        ConfigLayerSource::System => "system",
        ConfigLayerSource::User => "user",
        ConfigLayerSource::Project => "project",
        ConfigLayerSource::Cwd => "cwd",
        ConfigLayerSource::Repo => "repo",
        ConfigLayerSource::Runtime => "runtime",
        ConfigLayerSource::Env => "env",
    }
}

/// Canonical form when the path exists, otherwise the path as given.
pub(super) fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Nearest ancestor of `cwd`, itself included, holding one of `markers`.
pub(super) fn project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

#[cfg(any(unix, windows))]
pub(super) fn default_system_config_path() -> Option<PathBuf> {
    Some(PathBuf::from(super::SYSTEM_CONFIG_PATH))
}

#[cfg(not(any(unix, windows)))]
pub(super) fn default_system_config_path() -> Option<PathBuf> {
    None
}

/// `~/.membank/membank.json5`.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE)
    })
}
