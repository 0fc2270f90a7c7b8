//! Loading configuration files with environment interpolation

use promptwire_core::config::{
    load_from_json, load_from_yaml, ConfigError, ValidationErrorKind, DEFAULT_OPENAI_BASE_URL,
};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_with_interpolated_key() {
    std::env::set_var("PROMPTWIRE_CFG_YAML_KEY", "sk-from-env");
    let file = write_config(
        ".yaml",
        r#"
model: gpt-4o-mini
temperature: 0.7
seed: 11
max_retries: 3
api_key: ${PROMPTWIRE_CFG_YAML_KEY}
request_timeout_secs: 20
http:
  max_connections: 16
  connect_timeout_secs: 2
"#,
    );

    let config = load_from_yaml(file.path()).unwrap();

    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.llm.seed, Some(11));
    assert_eq!(config.llm.max_retries, 3);
    assert_eq!(config.api_key.expose_secret(), "sk-from-env");
    assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);
    assert_eq!(config.request_timeout(), Duration::from_secs(20));
    assert_eq!(config.http.max_connections, 16);
    assert_eq!(config.http.connect_timeout(), Duration::from_secs(2));
    // Unset pool settings keep their defaults
    assert_eq!(config.http.max_idle_per_host, 100);
}

#[test]
fn test_load_json_defaults() {
    let file = write_config(
        ".json",
        r#"{
            "model": "gpt-4o",
            "api_key": "sk-inline",
            "base_url": "http://localhost:8080/v1/",
            "organization_id": "org-1"
        }"#,
    );

    let config = load_from_json(file.path()).unwrap();

    assert_eq!(config.llm.temperature, 0.0);
    assert_eq!(config.llm.seed, None);
    assert_eq!(config.llm.max_retries, 8);
    assert_eq!(config.organization_id.as_deref(), Some("org-1"));
    assert_eq!(config.completions_url(), "http://localhost:8080/v1/chat/completions");
}

#[test]
fn test_missing_variable_is_reported() {
    std::env::remove_var("PROMPTWIRE_CFG_DEFINITELY_UNSET");
    let file = write_config(
        ".yaml",
        "model: gpt-4o\napi_key: ${PROMPTWIRE_CFG_DEFINITELY_UNSET}\n",
    );

    match load_from_yaml(file.path()) {
        Err(ConfigError::EnvVarNotFound { var }) => {
            assert_eq!(var, "PROMPTWIRE_CFG_DEFINITELY_UNSET")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_out_of_range_temperature_is_rejected() {
    let file = write_config(
        ".yaml",
        "model: gpt-4o\napi_key: sk-test\ntemperature: 3.5\n",
    );

    match load_from_yaml(file.path()) {
        Err(ConfigError::ValidationError(e)) => {
            assert_eq!(e.field_path, "temperature");
            assert!(matches!(e.kind, ValidationErrorKind::OutOfRange { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_invalid_base_url_is_rejected() {
    let file = write_config(
        ".json",
        r#"{"model": "gpt-4o", "api_key": "sk-test", "base_url": "not a url"}"#,
    );

    match load_from_json(file.path()) {
        Err(ConfigError::ValidationError(e)) => assert_eq!(e.field_path, "base_url"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_parse_error_carries_location() {
    let file = write_config(".yaml", "model: gpt-4o\napi_key: [unterminated\n");

    match load_from_yaml(file.path()) {
        Err(ConfigError::ParseError { line, message, .. }) => {
            assert!(line.is_some());
            assert!(!message.is_empty());
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_from_yaml(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::IoError { .. })));
}

#[test]
fn test_debug_output_hides_api_key() {
    let file = write_config(".yaml", "model: gpt-4o\napi_key: sk-very-secret\n");
    let config = load_from_yaml(file.path()).unwrap();

    let rendered = format!("{config:?}");
    assert!(!rendered.contains("sk-very-secret"));
    assert!(rendered.contains("[REDACTED]"));
}
