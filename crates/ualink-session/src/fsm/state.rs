// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! States and events of the session lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use ualink_fsm::FsmEvent;

use crate::completion::{Completion, Reply};
use crate::error::{SessionError, UaError};
use crate::status::StatusCode;
use crate::types::{CreateSessionRequest, CreateSessionResult, Session};

// =============================================================================
// SessionState
// =============================================================================

/// Lifecycle state of a session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session and no attempt in progress.
    Inactive,
    /// Waiting out the reconnect backoff.
    CreatingWait,
    /// CreateSession in flight.
    Creating,
    /// ActivateSession in flight.
    Activating,
    /// TransferSubscriptions in flight.
    Transferring,
    /// Session initializers running.
    Initializing,
    /// Session usable and monitored by keep-alive.
    Active,
    /// CloseSession in flight.
    Closing,
}

impl SessionState {
    /// All states, in lifecycle order.
    pub const ALL: [SessionState; 8] = [
        Self::Inactive,
        Self::CreatingWait,
        Self::Creating,
        Self::Activating,
        Self::Transferring,
        Self::Initializing,
        Self::Active,
        Self::Closing,
    ];

    /// States in which a collaborator call of the establishment sequence is pending.
    pub const IN_FLIGHT: [SessionState; 4] = [
        Self::Creating,
        Self::Activating,
        Self::Transferring,
        Self::Initializing,
    ];

    /// Returns `true` while a session is being established.
    pub fn is_establishing(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }

    /// Returns `true` if the session is usable.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if neither a session nor an attempt exists.
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "Inactive",
            Self::CreatingWait => "CreatingWait",
            Self::Creating => "Creating",
            Self::Activating => "Activating",
            Self::Transferring => "Transferring",
            Self::Initializing => "Initializing",
            Self::Active => "Active",
            Self::Closing => "Closing",
        };
        f.write_str(name)
    }
}

// =============================================================================
// SessionEvent
// =============================================================================

/// Result of a successful CreateSession, carried to the activation step.
#[derive(Debug)]
pub(crate) struct CreatedSession {
    pub(crate) request: CreateSessionRequest,
    pub(crate) result: CreateSessionResult,
}

/// Events processed by the session state machine.
///
/// User events carry the reply slot their caller waits on. Every other event is
/// fired by the controller itself.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    OpenSession(Reply<Completion<Session>>),
    CloseSession(Reply<Completion<()>>),
    GetSession(Reply<Completion<Session>>),

    CreatingWaitExpired,
    CreateSessionSuccess(Box<CreatedSession>),
    CreateSessionFailure(SessionError),
    ActivateSessionSuccess(Session),
    ActivateSessionFailure(SessionError),
    TransferSubscriptionsSuccess(Session),
    TransferSubscriptionsFailure(SessionError),
    InitializeSuccess(Session),
    InitializeFailure(SessionError),

    KeepAlive(Session),
    KeepAliveProbeSuccess(Session),
    KeepAliveProbeFailure(Session, UaError),
    KeepAliveFailure,
    ServiceFault(StatusCode),

    CloseSessionSuccess,
}

/// Payload-free discriminant of a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    /// A caller asked for a session.
    OpenSession,
    /// A caller asked to close the session.
    CloseSession,
    /// A caller asked for the current session without starting one.
    GetSession,
    /// The reconnect backoff elapsed.
    CreatingWaitExpired,
    /// CreateSession succeeded.
    CreateSessionSuccess,
    /// CreateSession failed.
    CreateSessionFailure,
    /// ActivateSession succeeded.
    ActivateSessionSuccess,
    /// ActivateSession failed.
    ActivateSessionFailure,
    /// Subscriptions were transferred, or transfer was not needed.
    TransferSubscriptionsSuccess,
    /// Subscription transfer failed.
    TransferSubscriptionsFailure,
    /// Every initializer succeeded.
    InitializeSuccess,
    /// An initializer failed.
    InitializeFailure,
    /// Keep-alive timer tick.
    KeepAlive,
    /// A keep-alive probe succeeded.
    KeepAliveProbeSuccess,
    /// A keep-alive probe failed.
    KeepAliveProbeFailure,
    /// Too many consecutive keep-alive probes failed.
    KeepAliveFailure,
    /// A session or channel invalidating fault was observed.
    ServiceFault,
    /// CloseSession completed.
    CloseSessionSuccess,
}

impl SessionEventKind {
    /// Establishment failures that send the machine back to `CreatingWait`.
    pub const ESTABLISH_FAILURES: [SessionEventKind; 4] = [
        Self::CreateSessionFailure,
        Self::ActivateSessionFailure,
        Self::TransferSubscriptionsFailure,
        Self::InitializeFailure,
    ];
}

impl FsmEvent for SessionEvent {
    type Kind = SessionEventKind;

    fn kind(&self) -> SessionEventKind {
        match self {
            Self::OpenSession(_) => SessionEventKind::OpenSession,
            Self::CloseSession(_) => SessionEventKind::CloseSession,
            Self::GetSession(_) => SessionEventKind::GetSession,
            Self::CreatingWaitExpired => SessionEventKind::CreatingWaitExpired,
            Self::CreateSessionSuccess(_) => SessionEventKind::CreateSessionSuccess,
            Self::CreateSessionFailure(_) => SessionEventKind::CreateSessionFailure,
            Self::ActivateSessionSuccess(_) => SessionEventKind::ActivateSessionSuccess,
            Self::ActivateSessionFailure(_) => SessionEventKind::ActivateSessionFailure,
            Self::TransferSubscriptionsSuccess(_) => SessionEventKind::TransferSubscriptionsSuccess,
            Self::TransferSubscriptionsFailure(_) => SessionEventKind::TransferSubscriptionsFailure,
            Self::InitializeSuccess(_) => SessionEventKind::InitializeSuccess,
            Self::InitializeFailure(_) => SessionEventKind::InitializeFailure,
            Self::KeepAlive(_) => SessionEventKind::KeepAlive,
            Self::KeepAliveProbeSuccess(_) => SessionEventKind::KeepAliveProbeSuccess,
            Self::KeepAliveProbeFailure(..) => SessionEventKind::KeepAliveProbeFailure,
            Self::KeepAliveFailure => SessionEventKind::KeepAliveFailure,
            Self::ServiceFault(_) => SessionEventKind::ServiceFault,
            Self::CloseSessionSuccess => SessionEventKind::CloseSessionSuccess,
        }
    }
}

impl SessionEvent {
    /// The error carried by an establishment failure.
    pub(crate) fn into_establish_error(self) -> Option<SessionError> {
        match self {
            Self::CreateSessionFailure(e)
            | Self::ActivateSessionFailure(e)
            | Self::TransferSubscriptionsFailure(e)
            | Self::InitializeFailure(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::CreatingWait.to_string(), "CreatingWait");
        assert_eq!(SessionState::ALL.len(), 8);
        assert!(SessionState::Transferring.is_establishing());
        assert!(!SessionState::CreatingWait.is_establishing());
        assert!(SessionState::Active.is_active());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&SessionState::CreatingWait).unwrap();
        assert_eq!(json, "\"creating_wait\"");
    }

    #[test]
    fn test_event_kind() {
        let (reply, _rx) = Reply::channel();
        assert_eq!(SessionEvent::OpenSession(reply).kind(), SessionEventKind::OpenSession);
        assert_eq!(
            SessionEvent::ServiceFault(StatusCode::Bad_SessionClosed).kind(),
            SessionEventKind::ServiceFault
        );
    }

    #[test]
    fn test_into_establish_error() {
        let event = SessionEvent::ActivateSessionFailure(SessionError::SessionClosed);
        assert_eq!(event.into_establish_error(), Some(SessionError::SessionClosed));
        assert_eq!(SessionEvent::KeepAliveFailure.into_establish_error(), None);
    }
}
