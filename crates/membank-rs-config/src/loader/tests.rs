//! Tests for layered configuration loading.

use super::*;
use crate::{AuthSource, CustomTopicConfig};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options rooted in a temp project with no ambient system/user/env layers.
fn isolated_options(root: &Path) -> (LayeredConfigOptions, PathBuf) {
    let project_root = root.join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");

    let mut options = LayeredConfigOptions::new(&cwd).with_env(Vec::<(String, String)>::new());
    options.system_config_path = None;
    options.user_config_path = None;
    (options, project_root)
}

#[test]
fn parse_minimal_config() {
    let config = MembankConfig::load_from_str("{}").expect("config");
    assert_eq!(config, MembankConfig::default());
    assert_eq!(config.location, "us-central1");
    assert_eq!(config.api.version, "v1beta1");
    assert_eq!(config.polling.initial_interval_ms, 1_000);
    assert_eq!(config.polling.max_interval_ms, 10_000);
    assert_eq!(config.polling.multiplier, 1.5);
    assert_eq!(config.polling.timeout_ms, 300_000);
    assert_eq!(config.auth.source, AuthSource::Auto);
}

#[test]
fn parses_full_config() {
    let json5 = r#"{
        // comments are fine in json5
        project: "my-project",
        location: "europe-west4",
        engine: "1234567890",
        api: { endpoint: "http://localhost:8080", version: "v1" },
        auth: { source: "gcloud" },
        polling: { initial_interval_ms: 250, max_interval_ms: 2000, multiplier: 2, timeout_ms: 60000 },
        engine_setup: {
            embedding_model: "text-embedding-005",
            custom_topics: [{ label: "technical_skills", description: "Languages and tools" }],
        },
        demo: { user_id: "alice" },
    }"#;
    let config = MembankConfig::load_from_str(json5).expect("config");
    assert_eq!(config.auth.source, AuthSource::Gcloud);
    assert_eq!(config.polling.multiplier, 2.0);
    assert_eq!(
        config.engine_setup.custom_topics,
        vec![CustomTopicConfig {
            label: "technical_skills".to_string(),
            description: "Languages and tools".to_string(),
        }]
    );
    assert_eq!(config.api.base_url(&config.location), "http://localhost:8080/v1/");
    assert_eq!(
        config.engine_name().expect("engine").to_string(),
        "projects/my-project/locations/europe-west4/reasoningEngines/1234567890"
    );
    assert_eq!(config.demo.user_id, "alice");
}

#[test]
fn default_base_url_is_regional() {
    let config = MembankConfig::default();
    assert_eq!(
        config.api.base_url("us-central1"),
        "https://us-central1-aiplatform.googleapis.com/v1beta1/"
    );
}

#[test]
fn engine_accepts_full_resource_name() {
    let config = MembankConfig::builder()
        .engine("projects/p/locations/asia-northeast1/reasoningEngines/42")
        .build();
    let engine = config.engine_name().expect("engine");
    assert_eq!(engine.engine_id, "42");
    assert_eq!(engine.location.location, "asia-northeast1");
}

#[test]
fn missing_project_is_reported() {
    let config = MembankConfig::builder().engine("42").build();
    let err = config.engine_name().unwrap_err();
    assert!(matches!(err, ConfigError::Missing("project")));
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = MembankConfig::load_from_str("{ unexpected: true }").unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("unknown key"));
    assert!(msg.contains("unexpected"));
}

#[test]
fn rejects_invalid_auth_source() {
    let err = MembankConfig::load_from_str(r#"{ auth: { source: "kerberos" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("auth.source"));
}

#[test]
fn rejects_nested_unknown_key_with_path() {
    let err = MembankConfig::load_from_str(
        r#"{ engine_setup: { custom_topics: [{ label: "a", colour: "red" }] } }"#,
    )
    .unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("engine_setup.custom_topics[0].colour"));
}

#[test]
fn validate_rejects_bad_polling_and_topics() {
    for (json5, path) in [
        ("{ polling: { multiplier: 0.5 } }", "polling.multiplier"),
        (
            "{ polling: { initial_interval_ms: 5000, max_interval_ms: 1000 } }",
            "polling.max_interval_ms",
        ),
        ("{ polling: { timeout_ms: 0 } }", "polling.timeout_ms"),
        (
            r#"{ engine_setup: { custom_topics: [{ label: "x" }, { label: "x" }] } }"#,
            "engine_setup.custom_topics[1].label",
        ),
        (
            r#"{ engine_setup: { custom_topics: [{ label: " " }] } }"#,
            "engine_setup.custom_topics[0].label",
        ),
    ] {
        let err = MembankConfig::load_from_str(json5).unwrap_err();
        match err {
            ConfigError::InvalidField { path: actual, .. } => assert_eq!(actual, path),
            other => panic!("unexpected error for {json5}: {other}"),
        }
    }
}

/// Ensure repo config takes precedence over cwd and project config.
#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let (mut options, project_root) = isolated_options(root);

    let system_config = root.join("system.json5");
    write_json5(&system_config, r#"{ project: "system", location: "system" }"#);
    let user_config = root.join("user.json5");
    write_json5(&user_config, r#"{ location: "user", demo: { user_id: "u" } }"#);
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        r#"{ location: "project" }"#,
    );
    write_json5(
        &options.cwd.join(DEFAULT_CONFIG_FILE),
        r#"{ location: "cwd" }"#,
    );
    write_json5(
        &project_root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
        r#"{ location: "repo" }"#,
    );

    options.system_config_path = Some(system_config);
    options.user_config_path = Some(user_config);

    let layered = MembankConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.location, "repo");
    assert_eq!(layered.config.project.as_deref(), Some("system"));
    assert_eq!(layered.config.demo.user_id, "u");
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
        ]
    );
}

#[test]
fn runtime_then_env_override_files() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let (options, project_root) = isolated_options(root);
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        r#"{ project: "file", engine: "1", auth: { source: "static", token: "from-file" } }"#,
    );
    let runtime = root.join("runtime.json5");
    write_json5(&runtime, r#"{ engine: "2", location: "runtime" }"#);

    let options = options.with_runtime_path(&runtime).with_env([
        (ENV_PROJECT, "env-project"),
        (ENV_ACCESS_TOKEN, "env-token"),
        (ENV_LOCATION, "  "),
    ]);
    let layered = MembankConfig::load_layered_with_options(options).expect("layered");
    let config = layered.config;
    assert_eq!(config.project.as_deref(), Some("env-project"));
    assert_eq!(config.engine.as_deref(), Some("2"));
    assert_eq!(config.location, "runtime");
    assert_eq!(config.auth.source, AuthSource::Static);
    assert_eq!(config.auth.token.as_deref(), Some("env-token"));
    assert_eq!(
        layered.layers.last(),
        Some(&ConfigLayer {
            source: ConfigLayerSource::Env,
            path: None,
        })
    );
}

#[test]
fn cwd_at_project_root_loads_once() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let (mut options, project_root) = isolated_options(root);
    options.cwd = project_root.clone();
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        r#"{ project: "p" }"#,
    );

    let layered = MembankConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.layers.len(), 1);
    assert_eq!(layered.layers[0].source, ConfigLayerSource::Project);
}

#[test]
fn missing_runtime_layer_fails() {
    let temp = TempDir::new().expect("tmp");
    let (options, _) = isolated_options(temp.path());
    let options = options.with_runtime_path(temp.path().join("absent.json5"));
    let err = MembankConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}
