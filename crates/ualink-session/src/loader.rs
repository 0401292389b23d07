// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Loading [`SessionConfig`] from files and the environment.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and detect the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Parse YAML, TOML or JSON
//! 4. Apply `UALINK_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UALINK_ENDPOINT_URL=opc.tcp://plc-7:4840
//! UALINK_SESSION_TIMEOUT=5m
//! UALINK_KEEP_ALIVE_FAILURES_ALLOWED=3
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads and validates a [`SessionConfig`].
///
/// ```no_run
/// use ualink_session::ConfigLoader;
///
/// let config = ConfigLoader::new().load("session.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve placeholders and apply overrides.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `UALINK` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: "UALINK".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<SessionConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading session configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

        let config = self.load_from_str(&content, format)?;
        debug!(
            endpoint = %config.endpoint_url,
            keep_alive_interval = ?config.keep_alive_interval,
            max_wait = ?config.max_wait,
            "Session configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string in the given format.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<SessionConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: SessionConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut SessionConfig) -> ConfigResult<()> {
        if let Some(value) = self.env("ENDPOINT_URL") {
            config.endpoint_url = value;
        }
        if let Some(value) = self.env("SESSION_NAME") {
            config.session_name = Some(value);
        }
        if let Some(value) = self.env_duration("SESSION_TIMEOUT")? {
            config.session_timeout = value;
        }
        if let Some(value) = self.env_duration("REQUEST_TIMEOUT")? {
            config.request_timeout = value;
        }
        if let Some(value) = self.env_duration("KEEP_ALIVE_INTERVAL")? {
            config.keep_alive_interval = value;
        }
        if let Some(value) = self.env("KEEP_ALIVE_FAILURES_ALLOWED") {
            config.keep_alive_failures_allowed = value.parse().map_err(|_| {
                ConfigError::invalid_value(
                    self.env_name("KEEP_ALIVE_FAILURES_ALLOWED"),
                    "expected a non-negative integer",
                )
            })?;
        }
        if let Some(value) = self.env_duration("MAX_WAIT")? {
            config.max_wait = value;
        }

        Ok(())
    }

    fn env_name(&self, key: &str) -> String {
        format!("{}_{}", self.env_prefix, key)
    }

    fn env(&self, key: &str) -> Option<String> {
        env::var(self.env_name(key)).ok()
    }

    fn env_duration(&self, key: &str) -> ConfigResult<Option<Duration>> {
        self.env(key)
            .map(|value| {
                humantime_serde::re::humantime::parse_duration(&value).map_err(|e| {
                    ConfigError::invalid_value(self.env_name(key), e.to_string())
                })
            })
            .transpose()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a document into `T`.
fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => {
            let config = config::Config::builder()
                .add_source(config::File::from_str(content, config::FileFormat::Yaml))
                .build()
                .map_err(|e| ConfigError::parse("yaml", e.to_string()))?;

            config
                .try_deserialize()
                .map_err(|e| ConfigError::parse("yaml", e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::parse("toml", e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::parse("json", e.to_string()))
        }
    }
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unknown variables without a default are left untouched.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }

        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<SessionConfig> {
    ConfigLoader::new().load(path)
}
