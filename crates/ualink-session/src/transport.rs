// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Collaborator interfaces the session controller drives.
//!
//! The controller treats every call as an opaque round trip that either
//! succeeds or fails with a [`UaError`](crate::UaError). Encoding, secure
//! channel handling and certificate validation live behind these traits.

use async_trait::async_trait;

use crate::error::UaResult;
use crate::status::StatusCode;
use crate::types::{
    ActivateSessionResult, CreateSessionRequest, CreateSessionResult, ServerState, Session,
    SubscriptionId,
};

// =============================================================================
// SessionTransport
// =============================================================================

/// Session services of an OPC UA client stack.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; calls are issued from background
/// tasks while the state machine keeps processing events.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Sends CreateSession.
    async fn create_session(&self, request: &CreateSessionRequest) -> UaResult<CreateSessionResult>;

    /// Sends ActivateSession for a freshly created session.
    ///
    /// Identity token selection and signature validation happen here.
    async fn activate_session(
        &self,
        request: &CreateSessionRequest,
        created: &CreateSessionResult,
    ) -> UaResult<ActivateSessionResult>;

    /// Sends TransferSubscriptions, returning one status per requested id.
    async fn transfer_subscriptions(
        &self,
        session: &Session,
        subscription_ids: &[SubscriptionId],
    ) -> UaResult<Vec<StatusCode>>;

    /// Reads `Server_ServerStatus_State`. Used as the keep-alive probe.
    async fn read_server_state(&self, session: &Session) -> UaResult<ServerState>;

    /// Sends CloseSession.
    async fn close_session(&self, session: &Session) -> UaResult<()>;
}

// =============================================================================
// SubscriptionRegistry
// =============================================================================

/// The subscription manager whose subscriptions follow the session.
pub trait SubscriptionRegistry: Send + Sync {
    /// Subscriptions to transfer to a new session.
    fn subscription_ids(&self) -> Vec<SubscriptionId>;

    /// Reports a subscription that could not be transferred.
    fn transfer_failed(&self, subscription_id: SubscriptionId, status: StatusCode);
}

/// A registry without subscriptions. Transfers always succeed immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSubscriptions;

impl SubscriptionRegistry for NoSubscriptions {
    fn subscription_ids(&self) -> Vec<SubscriptionId> {
        Vec::new()
    }

    fn transfer_failed(&self, _subscription_id: SubscriptionId, _status: StatusCode) {}
}
