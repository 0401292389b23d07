// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the session layer.
//!
//! ```text
//! UaError        - a failed collaborator call, carrying an OPC UA status
//! SessionError   - what a caller of open/get/close session observes
//! ConfigError    - configuration loading and validation
//! ```
//!
//! [`SessionError`] is `Clone` so a single establishment failure can be
//! delivered to every coalesced waiter.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::status::StatusCode;

// =============================================================================
// UaError
// =============================================================================

/// A failed service call reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} [{status}]")]
pub struct UaError {
    /// Status reported by the server or the transport.
    pub status: StatusCode,
    /// Human readable description.
    pub message: String,
}

impl UaError {
    /// Creates an error with an explicit message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates an error whose message is the status name.
    pub fn from_status(status: StatusCode) -> Self {
        let message = status.name().unwrap_or("Bad status").to_string();
        Self { status, message }
    }

    /// Creates a `Bad_Timeout` error for an operation that ran past `timeout`.
    pub fn timeout(operation: &str, timeout: Duration) -> Self {
        Self::new(
            StatusCode::Bad_Timeout,
            format!("{operation} timed out after {timeout:?}"),
        )
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` if repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.status,
            StatusCode::Bad_Timeout
                | StatusCode::Bad_ConnectionClosed
                | StatusCode::Bad_SecureChannelIdInvalid
                | StatusCode::Bad_TcpSecureChannelUnknown
                | StatusCode::Bad_SessionIdInvalid
                | StatusCode::Bad_SessionClosed
                | StatusCode::Bad_SessionNotActivated
                | StatusCode::Bad_OutOfService
        )
    }
}

impl From<StatusCode> for UaError {
    fn from(status: StatusCode) -> Self {
        Self::from_status(status)
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Errors observed by callers of the session controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The CreateSession round trip failed.
    #[error("Failed to create session: {0}")]
    CreateFailed(UaError),

    /// The ActivateSession round trip failed.
    #[error("Failed to activate session: {0}")]
    ActivateFailed(UaError),

    /// Subscription transfer failed in a way the transfer policy treats as fatal.
    #[error("Failed to transfer subscriptions: {0}")]
    TransferFailed(UaError),

    /// A registered session initializer failed.
    #[error("Failed to initialize session: {0}")]
    InitializeFailed(UaError),

    /// Too many consecutive keep-alive probes failed.
    #[error("Keep-alive failed {failures} consecutive times")]
    KeepAliveFailed {
        /// Consecutive failures observed.
        failures: u64,
    },

    /// The server reported a fault that invalidates the session.
    #[error("Session invalidated by service fault {status}")]
    ServiceFault {
        /// The classified fault status.
        status: StatusCode,
    },

    /// No session exists and none is being established.
    #[error("Session is closed")]
    SessionClosed,

    /// The state machine stopped before answering.
    #[error("Session state machine terminated")]
    Terminated,
}

impl SessionError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a create-session failure.
    #[inline]
    pub fn create_failed(error: impl Into<UaError>) -> Self {
        Self::CreateFailed(error.into())
    }

    /// Creates an activate-session failure.
    #[inline]
    pub fn activate_failed(error: impl Into<UaError>) -> Self {
        Self::ActivateFailed(error.into())
    }

    /// Creates a transfer failure.
    #[inline]
    pub fn transfer_failed(error: impl Into<UaError>) -> Self {
        Self::TransferFailed(error.into())
    }

    /// Creates an initializer failure.
    #[inline]
    pub fn initialize_failed(error: impl Into<UaError>) -> Self {
        Self::InitializeFailed(error.into())
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// The OPC UA status that best describes this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CreateFailed(e)
            | Self::ActivateFailed(e)
            | Self::TransferFailed(e)
            | Self::InitializeFailed(e) => e.status,
            Self::KeepAliveFailed { .. } => StatusCode::Bad_ConnectionClosed,
            Self::ServiceFault { status } => *status,
            Self::SessionClosed => StatusCode::Bad_SessionClosed,
            Self::Terminated => StatusCode::Bad_UnexpectedError,
        }
    }

    /// Returns `true` if calling `open_session` again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Terminated)
    }

    /// Returns the suggested delay before retrying.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            Self::CreateFailed(_) | Self::ActivateFailed(_) => Some(Duration::from_secs(1)),
            Self::TransferFailed(_) | Self::InitializeFailed(_) => Some(Duration::from_secs(1)),
            Self::KeepAliveFailed { .. } | Self::ServiceFault { .. } => {
                Some(Duration::from_millis(100))
            }
            Self::SessionClosed => Some(Duration::ZERO),
            Self::Terminated => None,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SessionClosed => ErrorSeverity::Info,
            Self::KeepAliveFailed { .. } | Self::ServiceFault { .. } => ErrorSeverity::Warning,
            Self::CreateFailed(e) | Self::ActivateFailed(e) if e.is_retryable() => {
                ErrorSeverity::Warning
            }
            Self::Terminated => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::CreateFailed(_) => "create",
            Self::ActivateFailed(_) => "activate",
            Self::TransferFailed(_) => "transfer",
            Self::InitializeFailed(_) => "initialize",
            Self::KeepAliveFailed { .. } => "keep_alive",
            Self::ServiceFault { .. } => "service_fault",
            Self::SessionClosed => "closed",
            Self::Terminated => "terminated",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreateFailed(_) => ErrorCode::new(2, 1),
            Self::ActivateFailed(_) => ErrorCode::new(2, 2),
            Self::TransferFailed(_) => ErrorCode::new(2, 3),
            Self::InitializeFailed(_) => ErrorCode::new(2, 4),
            Self::KeepAliveFailed { .. } => ErrorCode::new(2, 5),
            Self::ServiceFault { .. } => ErrorCode::new(2, 6),
            Self::SessionClosed => ErrorCode::new(2, 7),
            Self::Terminated => ErrorCode::new(2, 8),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::CreateFailed(_) => vec![
                "Check that the server is reachable",
                "Verify the endpoint URL",
            ],
            Self::ActivateFailed(_) => vec![
                "Verify the identity token",
                "Check that the client certificate is trusted by the server",
            ],
            Self::TransferFailed(_) => vec!["Recreate subscriptions on the new session"],
            Self::InitializeFailed(_) => vec!["Check the failing session initializer"],
            Self::KeepAliveFailed { .. } => vec![
                "Check network connectivity",
                "Increase keep_alive_timeout or keep_alive_failures_allowed",
            ],
            Self::ServiceFault { .. } => vec!["The session is re-established automatically"],
            Self::SessionClosed => vec!["Call open_session first"],
            Self::Terminated => vec!["Create a new session controller"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                status = %self.status_code(),
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                status = %self.status_code(),
                context = context,
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                status = %self.status_code(),
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document could not be parsed.
    #[error("Failed to parse {format} configuration: {message}")]
    Parse {
        /// Format being parsed.
        format: String,
        /// Parser message.
        message: String,
    },

    /// Required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// A field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Unsupported configuration format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The unsupported format.
        format: String,
    },
}

impl ConfigError {
    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Configuration errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }

    /// Returns the error type as a string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Parse { .. } => "parse",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidValue { .. } => "invalid_value",
            Self::UnsupportedFormat { .. } => "unsupported_format",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::new(8, 1),
            Self::Parse { .. } => ErrorCode::new(8, 2),
            Self::MissingField { .. } => ErrorCode::new(8, 3),
            Self::InvalidValue { .. } => ErrorCode::new(8, 4),
            Self::UnsupportedFormat { .. } => ErrorCode::new(8, 5),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Io { .. } => vec!["Check the file path and permissions"],
            Self::Parse { .. } => vec!["Check the file syntax"],
            Self::MissingField { .. } => vec!["Add the missing field"],
            Self::InvalidValue { .. } => vec!["Correct the field value"],
            Self::UnsupportedFormat { .. } => vec!["Use a .yaml, .yml, .toml or .json file"],
        }
    }

    /// Logs this error at error level.
    pub fn log(&self, context: &str) {
        tracing::error!(
            error_code = %self.error_code(),
            category = self.category(),
            context = context,
            "{self}"
        );
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `UA-XXYY` where XX is the category (2 session, 8 configuration)
/// and YY the specific error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result aliases
// =============================================================================

/// Result of a collaborator call.
pub type UaResult<T> = Result<T, UaError>;

/// Result of a session controller operation.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result of configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ua_error_display() {
        let error = UaError::from_status(StatusCode::Bad_Timeout);
        assert_eq!(error.to_string(), "Bad_Timeout [Bad_Timeout(0x800A0000)]");
        assert!(error.is_retryable());

        let error = UaError::new(StatusCode::Bad_NotSupported, "nope");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_timeout_factory() {
        let error = UaError::timeout("CreateSession", Duration::from_secs(10));
        assert_eq!(error.status(), StatusCode::Bad_Timeout);
        assert!(error.message.contains("CreateSession"));
    }

    #[test]
    fn test_session_error_status_code() {
        let error = SessionError::create_failed(StatusCode::Bad_Timeout);
        assert_eq!(error.status_code(), StatusCode::Bad_Timeout);
        assert_eq!(SessionError::SessionClosed.status_code(), StatusCode::Bad_SessionClosed);
        assert_eq!(
            SessionError::ServiceFault { status: StatusCode::Bad_SessionIdInvalid }.status_code(),
            StatusCode::Bad_SessionIdInvalid
        );
    }

    #[test]
    fn test_session_error_classification() {
        assert!(SessionError::SessionClosed.is_retryable());
        assert!(!SessionError::Terminated.is_retryable());
        assert_eq!(SessionError::Terminated.suggested_retry_delay(), None);
        assert_eq!(SessionError::SessionClosed.severity(), ErrorSeverity::Info);
        assert_eq!(
            SessionError::create_failed(StatusCode::Bad_Timeout).severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            SessionError::create_failed(StatusCode::Bad_NotSupported).severity(),
            ErrorSeverity::Error
        );
        assert_eq!(SessionError::initialize_failed(StatusCode::Bad_UnexpectedError).category(), "initialize");
        assert!(!SessionError::KeepAliveFailed { failures: 2 }.recovery_hints().is_empty());
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(SessionError::SessionClosed.error_code().to_string(), "UA-0207");
        assert_eq!(ConfigError::missing_field("endpoint_url").error_code().to_string(), "UA-0803");
        assert_eq!(ErrorCode::new(2, 1).as_u16(), 0x0201);
    }

    #[test]
    fn test_config_error_creation() {
        let error = ConfigError::invalid_value("max_wait", "must be >= initial_wait");
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
        assert_eq!(error.category(), "invalid_value");
        assert!(!error.is_retryable());
        assert_eq!(
            error.to_string(),
            "Invalid value for 'max_wait': must be >= initial_wait"
        );
    }
}
