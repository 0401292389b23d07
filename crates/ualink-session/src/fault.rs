// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service fault classification and subscription transfer policy.

use std::fmt;
use std::sync::Arc;

use ualink_fsm::FsmHandle;

use crate::fsm::SessionEvent;
use crate::status::StatusCode;

/// Receives the status of every service fault the transport observes.
pub trait ServiceFaultListener: Send + Sync {
    /// Called with the service result of a fault response.
    fn on_service_fault(&self, status: StatusCode);
}

/// Returns `true` for faults that mean the session no longer exists on the server.
pub fn is_session_error(status: StatusCode) -> bool {
    matches!(
        status.sub_code(),
        StatusCode::Bad_SessionClosed
            | StatusCode::Bad_SessionIdInvalid
            | StatusCode::Bad_SessionNotActivated
    )
}

/// Returns `true` for faults that mean the secure channel is gone.
pub fn is_secure_channel_error(status: StatusCode) -> bool {
    matches!(
        status.sub_code(),
        StatusCode::Bad_SecureChannelIdInvalid
            | StatusCode::Bad_SecurityChecksFailed
            | StatusCode::Bad_TcpSecureChannelUnknown
            | StatusCode::Bad_RequestTypeInvalid
    )
}

/// Forwards session and channel invalidating faults to a session state machine.
#[derive(Clone)]
pub struct SessionFaultListener {
    handle: FsmHandle<SessionEvent>,
}

impl SessionFaultListener {
    pub(crate) fn new(handle: FsmHandle<SessionEvent>) -> Self {
        Self { handle }
    }
}

impl ServiceFaultListener for SessionFaultListener {
    fn on_service_fault(&self, status: StatusCode) {
        if is_session_error(status) || is_secure_channel_error(status) {
            tracing::debug!(
                instance_id = self.handle.instance_id(),
                status = %status,
                "Service fault invalidates session"
            );
            self.handle.fire_event(SessionEvent::ServiceFault(status));
        }
    }
}

impl fmt::Debug for SessionFaultListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFaultListener")
            .field("instance_id", &self.handle.instance_id())
            .finish()
    }
}

/// Decides which whole-service TransferSubscriptions failures mean
/// "transfer not supported".
///
/// Such failures drop every subscription and let establishment continue.
/// Any other failure fails establishment.
#[derive(Clone)]
pub struct TransferPolicy {
    is_unsupported: Arc<dyn Fn(StatusCode) -> bool + Send + Sync>,
}

impl TransferPolicy {
    /// Creates a policy from a predicate.
    pub fn new(is_unsupported: impl Fn(StatusCode) -> bool + Send + Sync + 'static) -> Self {
        Self {
            is_unsupported: Arc::new(is_unsupported),
        }
    }

    /// Returns `true` if `status` means the server cannot transfer subscriptions.
    pub fn is_unsupported(&self, status: StatusCode) -> bool {
        (self.is_unsupported)(status)
    }
}

impl Default for TransferPolicy {
    fn default() -> Self {
        // Servers disagree on which code to answer with.
        Self::new(|status| {
            matches!(
                status.sub_code(),
                StatusCode::Bad_NotImplemented
                    | StatusCode::Bad_NotSupported
                    | StatusCode::Bad_OutOfService
                    | StatusCode::Bad_ServiceUnsupported
            )
        })
    }
}

impl fmt::Debug for TransferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferPolicy").finish_non_exhaustive()
    }
}
