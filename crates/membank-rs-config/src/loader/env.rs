//! Environment variable overrides, applied as the top config layer.

use super::{ConfigLayer, ConfigLayerSource, LoadedLayer};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Cloud project id.
pub const ENV_PROJECT: &str = "GCP_PROJECT_ID";
/// Region hosting the agent engine.
pub const ENV_LOCATION: &str = "GCP_LOCATION";
/// Engine id or full reasoning engine name.
pub const ENV_ENGINE: &str = "AGENT_ENGINE_NAME";
/// Bearer token used instead of discovering credentials.
pub const ENV_ACCESS_TOKEN: &str = "MEMBANK_ACCESS_TOKEN";

const RECOGNISED: [&str; 4] = [ENV_PROJECT, ENV_LOCATION, ENV_ENGINE, ENV_ACCESS_TOKEN];

/// Snapshot the recognised variables from the process environment.
pub(super) fn capture_process_env() -> BTreeMap<String, String> {
    RECOGNISED
        .iter()
        .filter_map(|key| {
            std::env::var(key)
                .ok()
                .map(|value| (key.to_string(), value))
        })
        .collect()
}

/// Build the overlay for the captured variables. Empty values are ignored.
pub(super) fn env_layer(env: &BTreeMap<String, String>) -> Option<LoadedLayer> {
    let lookup = |key: &str| {
        env.get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let mut overlay = Map::new();
    if let Some(project) = lookup(ENV_PROJECT) {
        overlay.insert("project".to_string(), json!(project));
    }
    if let Some(location) = lookup(ENV_LOCATION) {
        overlay.insert("location".to_string(), json!(location));
    }
    if let Some(engine) = lookup(ENV_ENGINE) {
        overlay.insert("engine".to_string(), json!(engine));
    }
    if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
        overlay.insert("auth".to_string(), json!({ "token": token }));
    }

    if overlay.is_empty() {
        return None;
    }
    Some(LoadedLayer {
        meta: ConfigLayer {
            source: ConfigLayerSource::Env,
            path: None,
        },
        value: Value::Object(overlay),
    })
}
