//! Schema validation helpers for membank JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Type-check a layer, or the merged value, before serde decodes it.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema",
        "project",
        "location",
        "engine",
        "api",
        "auth",
        "polling",
        "engine_setup",
        "demo",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    for key in ["$schema", "project", "location", "engine"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, key)?;
        }
    }
    if let Some(value) = map.get("api") {
        validate_api(value, layer, "api")?;
    }
    if let Some(value) = map.get("auth") {
        validate_auth(value, layer, "auth")?;
    }
    if let Some(value) = map.get("polling") {
        validate_polling(value, layer, "polling")?;
    }
    if let Some(value) = map.get("engine_setup") {
        validate_engine_setup(value, layer, "engine_setup")?;
    }
    if let Some(value) = map.get("demo") {
        validate_demo(value, layer, "demo")?;
    }

    Ok(())
}

/// Validate the "api" block.
fn validate_api(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["endpoint", "version"], layer, path)?;

    if let Some(value) = map.get("endpoint") {
        let endpoint_path = join_path(path, "endpoint");
        let endpoint = value
            .as_str()
            .ok_or_else(|| invalid_field(layer, &endpoint_path, "expected string"))?;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(invalid_field(
                layer,
                &endpoint_path,
                "expected http:// or https:// URL",
            ));
        }
    }
    if let Some(value) = map.get("version") {
        expect_string(value, layer, &join_path(path, "version"))?;
    }
    Ok(())
}

/// Validate the "auth" block.
fn validate_auth(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["source", "token"], layer, path)?;

    if let Some(value) = map.get("source") {
        expect_enum(
            value,
            &["auto", "static", "gcloud", "metadata"],
            layer,
            &join_path(path, "source"),
        )?;
    }
    if let Some(value) = map.get("token") {
        expect_string(value, layer, &join_path(path, "token"))?;
    }
    Ok(())
}

/// Validate the "polling" block.
fn validate_polling(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "initial_interval_ms",
            "max_interval_ms",
            "multiplier",
            "timeout_ms",
        ],
        layer,
        path,
    )?;

    for key in ["initial_interval_ms", "max_interval_ms", "timeout_ms"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("multiplier") {
        expect_f64(value, layer, &join_path(path, "multiplier"))?;
    }
    Ok(())
}

/// Validate the "engine_setup" block.
fn validate_engine_setup(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["embedding_model", "custom_topics"], layer, path)?;

    if let Some(value) = map.get("embedding_model") {
        expect_string(value, layer, &join_path(path, "embedding_model"))?;
    }
    if let Some(value) = map.get("custom_topics") {
        let topics_path = join_path(path, "custom_topics");
        let arr = expect_array(value, layer, &topics_path)?;
        for (idx, entry) in arr.iter().enumerate() {
            validate_custom_topic(entry, layer, &format!("{topics_path}[{idx}]"))?;
        }
    }
    Ok(())
}

/// Validate a single custom topic definition.
fn validate_custom_topic(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["label", "description"], layer, path)?;

    let label_path = join_path(path, "label");
    let Some(label) = map.get("label") else {
        return Err(invalid_field(layer, &label_path, "missing required field"));
    };
    expect_string(label, layer, &label_path)?;

    if let Some(value) = map.get("description") {
        expect_string(value, layer, &join_path(path, "description"))?;
    }
    Ok(())
}

/// Validate the "demo" block.
fn validate_demo(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["user_id"], layer, path)?;
    if let Some(value) = map.get("user_id") {
        expect_string(value, layer, &join_path(path, "user_id"))?;
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(invalid_field(layer, path, "expected array")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect one of a fixed set of strings.
fn expect_enum(
    value: &Value,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match value.as_str() {
        Some(variant) if allowed.contains(&variant) => Ok(()),
        _ => Err(invalid_field(
            layer,
            path,
            &format!("expected one of {}", allowed.join(", ")),
        )),
    }
}

/// Expect a non-negative JSON integer.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a JSON number.
fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Reject keys outside `allowed`, naming the offending path.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error tagged with the layer label.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
