// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for loading session configuration from files and the environment.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ualink_session::{load_config, ConfigError, ConfigLoader, SessionFsm};
use ualink_tests::prelude::*;

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write config file");
    path
}

/// A loader whose overrides only see variables set by this test.
fn isolated_loader(test: &str) -> (ConfigLoader, String) {
    let prefix = unique_env_prefix(test);
    (ConfigLoader::new().with_env_prefix(prefix.clone()), prefix)
}

// =============================================================================
// Formats
// =============================================================================

#[test]
fn test_load_yaml_file() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.yaml", DocumentFixtures::yaml());
    let (loader, _) = isolated_loader("yaml");

    let config = loader.load(&path).expect("valid yaml");

    assert_eq!(config.endpoint_url, "opc.tcp://plc.local:4840");
    assert_eq!(config.application_name, "Line 3 Gateway");
    assert_eq!(config.session_timeout, Duration::from_secs(120));
    assert_eq!(config.keep_alive_interval, Duration::from_secs(2));
    assert_eq!(config.keep_alive_failures_allowed, 3);
    assert_eq!(config.max_wait, Duration::from_secs(30));
    assert_eq!(config.initial_wait, Duration::from_secs(1));
}

#[test]
fn test_load_toml_file() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.toml", DocumentFixtures::toml());
    let (loader, _) = isolated_loader("toml");

    let config = loader.load(&path).expect("valid toml");

    assert_eq!(config.session_name.as_deref(), Some("line-3"));
    assert_eq!(config.request_timeout, Duration::from_secs(5));
    assert_eq!(config.initial_wait, Duration::from_millis(500));
    assert_eq!(config.max_wait, Duration::from_secs(8));
    assert_eq!(config.effective_session_name(), "line-3");
}

#[test]
fn test_load_json_file() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.json", DocumentFixtures::json());
    let (loader, _) = isolated_loader("json");

    let config = loader.load(&path).expect("valid json");

    assert_eq!(config.keep_alive_timeout, Duration::from_secs(1));
    assert_eq!(config.max_response_message_size, 65536);
    assert_eq!(config.keep_alive_failures_allowed, 1);
}

#[test]
fn test_unknown_extension_is_rejected() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.ini", "endpoint_url = opc.tcp://x:4840");

    let err = load_config(&path).expect_err("unsupported format");

    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }), "got {err:?}");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = temp_test_dir("ualink-config");

    let err = load_config(dir.path().join("absent.yaml")).expect_err("missing file");

    assert!(matches!(err, ConfigError::Io { .. }), "got {err:?}");
}

#[test]
fn test_malformed_document_is_parse_error() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.toml", "endpoint_url = [");

    let err = load_config(&path).expect_err("malformed toml");

    assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
}

#[test]
fn test_invalid_endpoint_fails_validation() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.json", r#"{ "endpoint_url": "http://plc.local" }"#);
    let (loader, _) = isolated_loader("invalid");

    let err = loader.load(&path).expect_err("non opc.tcp endpoint");

    assert!(matches!(err, ConfigError::InvalidValue { .. }), "got {err:?}");
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_placeholders_fall_back_to_defaults() {
    let loader = ConfigLoader::new().with_env_prefix(unique_env_prefix("fallback"));
    env::remove_var("UALINK_TEST_ENDPOINT");
    env::remove_var("UALINK_TEST_SESSION_NAME");

    let config = loader
        .load_from_str(DocumentFixtures::yaml_with_placeholders(), ualink_session::ConfigFormat::Yaml)
        .expect("defaults resolve");

    assert_eq!(config.endpoint_url, "opc.tcp://fallback:4840");
    assert_eq!(config.session_name.as_deref(), Some("default-session"));
}

#[test]
fn test_overrides_take_precedence_over_file() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.yaml", DocumentFixtures::yaml());
    let (loader, prefix) = isolated_loader("override");

    env::set_var(format!("{prefix}_ENDPOINT_URL"), "opc.tcp://override:4841");
    env::set_var(format!("{prefix}_KEEP_ALIVE_FAILURES_ALLOWED"), "7");
    env::set_var(format!("{prefix}_MAX_WAIT"), "1m");

    let config = loader.load(&path).expect("overrides apply");

    assert_eq!(config.endpoint_url, "opc.tcp://override:4841");
    assert_eq!(config.keep_alive_failures_allowed, 7);
    assert_eq!(config.max_wait, Duration::from_secs(60));
    assert_eq!(config.application_name, "Line 3 Gateway");
}

#[test]
fn test_malformed_override_is_rejected() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.yaml", DocumentFixtures::yaml());
    let (loader, prefix) = isolated_loader("malformed");

    env::set_var(format!("{prefix}_SESSION_TIMEOUT"), "soon");

    let err = loader.load(&path).expect_err("bad duration");

    assert!(matches!(err, ConfigError::InvalidValue { .. }), "got {err:?}");
}

#[test]
fn test_overrides_disabled() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.yaml", DocumentFixtures::yaml());
    let (loader, prefix) = isolated_loader("disabled");
    env::set_var(format!("{prefix}_ENDPOINT_URL"), "opc.tcp://ignored:4840");

    let config = loader.with_env_vars(false).load(&path).expect("valid yaml");

    assert_eq!(config.endpoint_url, "opc.tcp://plc.local:4840");
}

// =============================================================================
// Controller
// =============================================================================

#[tokio::test]
async fn test_loaded_config_drives_controller() {
    let dir = temp_test_dir("ualink-config");
    let path = write(&dir, "session.toml", DocumentFixtures::toml());
    let (loader, _) = isolated_loader("controller");
    let config = loader.load(&path).expect("valid toml");

    let transport = Arc::new(ScriptedTransport::new());
    let fsm = SessionFsm::new(config, transport.clone()).expect("valid config");
    let session = within(fsm.open_session()).await.expect("session");

    assert_eq!(session.session_name(), "line-3");
    assert_eq!(fsm.config().max_wait, Duration::from_secs(8));
    assert_eq!(transport.requests()[0].endpoint_url, "opc.tcp://plc.local:4840");
}
