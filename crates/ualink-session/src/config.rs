// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session controller configuration.
//!
//! ```
//! use std::time::Duration;
//! use ualink_session::SessionConfig;
//!
//! let config = SessionConfig::builder()
//!     .endpoint_url("opc.tcp://localhost:4840")
//!     .keep_alive_failures_allowed(3)
//!     .max_wait(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.keep_alive_interval, Duration::from_secs(5));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::error::{ConfigError, ConfigResult};

/// Configuration of one session controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server endpoint URL (e.g., "opc.tcp://localhost:4840").
    pub endpoint_url: String,

    /// Application name.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI. Derived from the application name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Product URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_uri: Option<String>,

    /// Session name. A fresh `UaSession:<uuid>` is used per attempt when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Bound on every create/activate/transfer/initialize/close round trip.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Maximum response size the client accepts, 0 = unlimited.
    #[serde(default)]
    pub max_response_message_size: u32,

    /// Interval between keep-alive probes.
    #[serde(default = "default_keep_alive_interval", with = "humantime_serde")]
    pub keep_alive_interval: Duration,

    /// Bound on a single keep-alive probe.
    #[serde(default = "default_keep_alive_timeout", with = "humantime_serde")]
    pub keep_alive_timeout: Duration,

    /// Consecutive probe failures tolerated before the session is dropped.
    #[serde(default = "default_keep_alive_failures_allowed")]
    pub keep_alive_failures_allowed: u64,

    /// First reconnect delay.
    #[serde(default = "default_initial_wait", with = "humantime_serde")]
    pub initial_wait: Duration,

    /// Upper bound of the reconnect delay.
    #[serde(default = "default_max_wait", with = "humantime_serde")]
    pub max_wait: Duration,
}

fn default_application_name() -> String {
    "ualink".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_keep_alive_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_keep_alive_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_keep_alive_failures_allowed() -> u64 {
    1
}

fn default_initial_wait() -> Duration {
    Duration::from_secs(1)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(16)
}

impl SessionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Creates a configuration with defaults for everything but the endpoint.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint_url.is_empty() {
            return Err(ConfigError::missing_field("endpoint_url"));
        }

        if !self.endpoint_url.starts_with("opc.tcp://") {
            return Err(ConfigError::invalid_value(
                "endpoint_url",
                format!("'{}' must start with opc.tcp://", self.endpoint_url),
            ));
        }

        let non_zero = [
            ("session_timeout", self.session_timeout),
            ("request_timeout", self.request_timeout),
            ("keep_alive_interval", self.keep_alive_interval),
            ("keep_alive_timeout", self.keep_alive_timeout),
            ("initial_wait", self.initial_wait),
        ];
        for (field, value) in non_zero {
            if value.is_zero() {
                return Err(ConfigError::invalid_value(field, "must be greater than 0"));
            }
        }

        if self.max_wait < self.initial_wait {
            return Err(ConfigError::invalid_value(
                "max_wait",
                format!(
                    "{:?} is shorter than initial_wait {:?}",
                    self.max_wait, self.initial_wait
                ),
            ));
        }

        Ok(())
    }

    /// Returns the effective application URI.
    pub fn effective_application_uri(&self) -> String {
        self.application_uri
            .clone()
            .unwrap_or_else(|| format!("urn:ualink:{}", self.application_name.replace(' ', "")))
    }

    /// Returns the session name for the next CreateSession call.
    pub fn effective_session_name(&self) -> String {
        self.session_name
            .clone()
            .unwrap_or_else(|| format!("UaSession:{}", Uuid::new_v4()))
    }

    /// The reconnect backoff policy.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_wait, self.max_wait)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            application_name: default_application_name(),
            application_uri: None,
            product_uri: None,
            session_name: None,
            session_timeout: default_session_timeout(),
            request_timeout: default_request_timeout(),
            max_response_message_size: 0,
            keep_alive_interval: default_keep_alive_interval(),
            keep_alive_timeout: default_keep_alive_timeout(),
            keep_alive_failures_allowed: default_keep_alive_failures_allowed(),
            initial_wait: default_initial_wait(),
            max_wait: default_max_wait(),
        }
    }
}

// =============================================================================
// SessionConfigBuilder
// =============================================================================

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    endpoint_url: Option<String>,
    application_name: Option<String>,
    application_uri: Option<String>,
    product_uri: Option<String>,
    session_name: Option<String>,
    session_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_response_message_size: Option<u32>,
    keep_alive_interval: Option<Duration>,
    keep_alive_timeout: Option<Duration>,
    keep_alive_failures_allowed: Option<u64>,
    initial_wait: Option<Duration>,
    max_wait: Option<Duration>,
}

impl SessionConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.application_uri = Some(uri.into());
        self
    }

    /// Sets the product URI.
    pub fn product_uri(mut self, uri: impl Into<String>) -> Self {
        self.product_uri = Some(uri.into());
        self
    }

    /// Sets a fixed session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    /// Sets the requested session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the maximum response message size.
    pub fn max_response_message_size(mut self, size: u32) -> Self {
        self.max_response_message_size = Some(size);
        self
    }

    /// Sets the keep-alive interval.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    /// Sets the keep-alive probe timeout.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = Some(timeout);
        self
    }

    /// Sets the number of consecutive keep-alive failures tolerated.
    pub fn keep_alive_failures_allowed(mut self, count: u64) -> Self {
        self.keep_alive_failures_allowed = Some(count);
        self
    }

    /// Sets the first reconnect delay.
    pub fn initial_wait(mut self, wait: Duration) -> Self {
        self.initial_wait = Some(wait);
        self
    }

    /// Sets the maximum reconnect delay.
    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SessionConfig> {
        let endpoint_url = self
            .endpoint_url
            .ok_or_else(|| ConfigError::missing_field("endpoint_url"))?;

        let config = SessionConfig {
            endpoint_url,
            application_name: self.application_name.unwrap_or_else(default_application_name),
            application_uri: self.application_uri,
            product_uri: self.product_uri,
            session_name: self.session_name,
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
            request_timeout: self.request_timeout.unwrap_or_else(default_request_timeout),
            max_response_message_size: self.max_response_message_size.unwrap_or(0),
            keep_alive_interval: self
                .keep_alive_interval
                .unwrap_or_else(default_keep_alive_interval),
            keep_alive_timeout: self
                .keep_alive_timeout
                .unwrap_or_else(default_keep_alive_timeout),
            keep_alive_failures_allowed: self
                .keep_alive_failures_allowed
                .unwrap_or_else(default_keep_alive_failures_allowed),
            initial_wait: self.initial_wait.unwrap_or_else(default_initial_wait),
            max_wait: self.max_wait.unwrap_or_else(default_max_wait),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("opc.tcp://localhost:4840");
        assert_eq!(config.session_timeout, Duration::from_secs(120));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(5));
        assert_eq!(config.keep_alive_timeout, Duration::from_secs(5));
        assert_eq!(config.keep_alive_failures_allowed, 1);
        assert_eq!(config.initial_wait, Duration::from_secs(1));
        assert_eq!(config.max_wait, Duration::from_secs(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_requires_endpoint() {
        let err = SessionConfig::builder().build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "endpoint_url"));
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let err = SessionConfig::new("http://localhost:4840").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "endpoint_url"));
    }

    #[test]
    fn test_validate_durations() {
        let err = SessionConfig::builder()
            .endpoint_url("opc.tcp://localhost:4840")
            .keep_alive_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "keep_alive_interval"));

        let err = SessionConfig::builder()
            .endpoint_url("opc.tcp://localhost:4840")
            .initial_wait(Duration::from_secs(4))
            .max_wait(Duration::from_secs(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "max_wait"));
    }

    #[test]
    fn test_effective_names() {
        let config = SessionConfig::builder()
            .endpoint_url("opc.tcp://localhost:4840")
            .application_name("Line 4 Client")
            .build()
            .unwrap();
        assert_eq!(config.effective_application_uri(), "urn:ualink:Line4Client");
        assert!(config.effective_session_name().starts_with("UaSession:"));
        assert_ne!(config.effective_session_name(), config.effective_session_name());

        let fixed = SessionConfig {
            session_name: Some("fixed".into()),
            ..config
        };
        assert_eq!(fixed.effective_session_name(), "fixed");
    }

    #[test]
    fn test_humantime_serde() {
        let json = r#"{"endpoint_url":"opc.tcp://plc:4840","keep_alive_interval":"750ms","max_wait":"1m"}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.keep_alive_interval, Duration::from_millis(750));
        assert_eq!(config.max_wait, Duration::from_secs(60));
        assert_eq!(config.session_timeout, Duration::from_secs(120));
    }
}
