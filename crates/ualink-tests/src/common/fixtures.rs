// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built configurations and documents for consistent testing.

use std::time::Duration;

use ualink_session::SessionConfig;

/// Endpoint used by every fixture.
pub const TEST_ENDPOINT: &str = "opc.tcp://localhost:4840";

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing standard session configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Defaults against the test endpoint.
    pub fn default_config() -> SessionConfig {
        SessionConfig::new(TEST_ENDPOINT)
    }

    /// A configuration tolerating `allowed` consecutive keep-alive failures.
    pub fn with_keep_alive_failures_allowed(allowed: u64) -> SessionConfig {
        SessionConfig {
            keep_alive_failures_allowed: allowed,
            ..Self::default_config()
        }
    }

    /// A configuration with a fixed session name.
    pub fn named(name: &str) -> SessionConfig {
        SessionConfig {
            session_name: Some(name.to_string()),
            ..Self::default_config()
        }
    }

    /// A configuration with a short collaborator timeout.
    pub fn short_request_timeout() -> SessionConfig {
        SessionConfig {
            request_timeout: Duration::from_millis(50),
            ..Self::default_config()
        }
    }
}

// =============================================================================
// Document Fixtures
// =============================================================================

/// Configuration documents in every supported format.
pub struct DocumentFixtures;

impl DocumentFixtures {
    /// A YAML document.
    pub fn yaml() -> &'static str {
        r#"
endpoint_url: "opc.tcp://plc.local:4840"
application_name: "Line 3 Gateway"
session_timeout: 2m
keep_alive_interval: 2s
keep_alive_failures_allowed: 3
max_wait: 30s
"#
    }

    /// A TOML document.
    pub fn toml() -> &'static str {
        r#"
endpoint_url = "opc.tcp://plc.local:4840"
session_name = "line-3"
request_timeout = "5s"
initial_wait = "500ms"
max_wait = "8s"
"#
    }

    /// A JSON document.
    pub fn json() -> &'static str {
        r#"{
  "endpoint_url": "opc.tcp://plc.local:4840",
  "keep_alive_timeout": "1s",
  "max_response_message_size": 65536
}"#
    }

    /// A YAML document with environment placeholders.
    pub fn yaml_with_placeholders() -> &'static str {
        r#"
endpoint_url: "${UALINK_TEST_ENDPOINT:opc.tcp://fallback:4840}"
session_name: "${UALINK_TEST_SESSION_NAME:default-session}"
"#
    }
}
