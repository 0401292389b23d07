// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session data types exchanged with collaborators.
//!
//! - **NodeId**: session ids and authentication tokens
//! - **CreateSessionRequest/Result**, **ActivateSessionResult**: service payloads
//! - **Session**: the activated unit of work handed to callers
//! - **ServerState**, **SubscriptionId**

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier.
///
/// # Examples
///
/// ```
/// use ualink_session::NodeId;
///
/// let token: NodeId = "ns=0;b=AAEC".parse().unwrap();
/// assert_eq!(token.to_string(), "ns=0;b=AAEC");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index.
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node id.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node id.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node id.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque node id.
    #[inline]
    pub fn opaque(namespace_index: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value.into()),
        }
    }

    /// The null node id (`ns=0;i=0`).
    pub fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// Returns `true` for the null node id.
    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};{}", self.namespace_index, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = ConfigError;

    /// Parses `ns=<n>;i=..`, `s=..`, `g=..` or `b=..`. The namespace part is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |message: String| ConfigError::invalid_value("node_id", format!("{s}: {message}"));

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("missing identifier after namespace".into()))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| invalid("invalid namespace index".into()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("invalid numeric identifier".into()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(Uuid::parse_str(id).map_err(|e| invalid(format!("invalid GUID: {e}")))?)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("invalid base64: {e}")))?,
            )
        } else {
            return Err(invalid("expected i=, s=, g= or b=".into()));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// ServerState
// =============================================================================

/// Value of the server's `ServerStatus.State` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// The server is running normally.
    Running,
    /// A vendor-specific fatal error occurred.
    Failed,
    /// The server has no configuration.
    NoConfiguration,
    /// The server has been suspended.
    Suspended,
    /// The server is shutting down.
    Shutdown,
    /// The server is in test mode.
    Test,
    /// The server is running but cannot reach its data sources.
    CommunicationFault,
    /// The state could not be determined.
    Unknown,
}

impl ServerState {
    /// Maps the numeric enumeration value to a state.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Failed,
            2 => Self::NoConfiguration,
            3 => Self::Suspended,
            4 => Self::Shutdown,
            5 => Self::Test,
            6 => Self::CommunicationFault,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for [`ServerState::Running`].
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "Running",
            Self::Failed => "Failed",
            Self::NoConfiguration => "NoConfiguration",
            Self::Suspended => "Suspended",
            Self::Shutdown => "Shutdown",
            Self::Test => "Test",
            Self::CommunicationFault => "CommunicationFault",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

// =============================================================================
// SubscriptionId
// =============================================================================

/// Server-assigned subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// Service payloads
// =============================================================================

/// Parameters of a CreateSession call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    /// Endpoint the session is created against.
    pub endpoint_url: String,
    /// Human readable session name.
    pub session_name: String,
    /// Client application URI.
    pub application_uri: String,
    /// Random client nonce.
    pub client_nonce: Vec<u8>,
    /// Requested session timeout.
    pub requested_session_timeout: Duration,
    /// Maximum response size the client accepts, 0 = unlimited.
    pub max_response_message_size: u32,
}

/// Server answer to CreateSession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionResult {
    /// Server-assigned session id.
    pub session_id: NodeId,
    /// Secret token that identifies the session in every request.
    pub authentication_token: NodeId,
    /// Session timeout granted by the server.
    pub revised_session_timeout: Duration,
    /// Server nonce.
    pub server_nonce: Vec<u8>,
    /// DER encoded server certificate, if any.
    pub server_certificate: Option<Vec<u8>>,
    /// Maximum request size the server accepts, 0 = unlimited.
    pub max_request_message_size: u32,
}

/// Server answer to ActivateSession.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateSessionResult {
    /// Fresh server nonce for the next activation.
    pub server_nonce: Vec<u8>,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug)]
struct SessionInner {
    session_id: NodeId,
    authentication_token: NodeId,
    session_name: String,
    endpoint_url: String,
    session_timeout: Duration,
    max_request_message_size: u32,
    server_nonce: Vec<u8>,
    server_certificate: Option<Vec<u8>>,
}

/// An activated session.
///
/// Cloning is cheap. Two values compare equal only if they are clones of the
/// same activation.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Builds a session from the results of CreateSession and ActivateSession.
    pub fn new(
        request: &CreateSessionRequest,
        created: CreateSessionResult,
        activated: ActivateSessionResult,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id: created.session_id,
                authentication_token: created.authentication_token,
                session_name: request.session_name.clone(),
                endpoint_url: request.endpoint_url.clone(),
                session_timeout: created.revised_session_timeout,
                max_request_message_size: created.max_request_message_size,
                server_nonce: activated.server_nonce,
                server_certificate: created.server_certificate,
            }),
        }
    }

    /// Server-assigned session id.
    pub fn session_id(&self) -> &NodeId {
        &self.inner.session_id
    }

    /// Token sent with every request on this session.
    pub fn authentication_token(&self) -> &NodeId {
        &self.inner.authentication_token
    }

    /// Session name sent in CreateSession.
    pub fn session_name(&self) -> &str {
        &self.inner.session_name
    }

    /// Endpoint the session lives on.
    pub fn endpoint_url(&self) -> &str {
        &self.inner.endpoint_url
    }

    /// Timeout negotiated with the server.
    pub fn session_timeout(&self) -> Duration {
        self.inner.session_timeout
    }

    /// Maximum request size negotiated with the server.
    pub fn max_request_message_size(&self) -> u32 {
        self.inner.max_request_message_size
    }

    /// Last server nonce.
    pub fn server_nonce(&self) -> &[u8] {
        &self.inner.server_nonce
    }

    /// Server certificate, if the endpoint is secured.
    pub fn server_certificate(&self) -> Option<&[u8]> {
        self.inner.server_certificate.as_deref()
    }

    /// Returns `true` if both values come from the same activation.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Session {}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.inner.session_name, self.inner.session_id)
    }
}
