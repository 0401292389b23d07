// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single-resolution result slots shared between the state machine and callers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use crate::error::{SessionError, SessionResult};

// =============================================================================
// Completion
// =============================================================================

/// A result that is written once and read by any number of waiters.
///
/// Clones share the slot. Only the first [`complete`](Self::complete) wins.
/// Waiters observe [`SessionError::Terminated`] if every clone is dropped
/// before a result was written.
pub struct Completion<T> {
    slot: Arc<watch::Sender<Option<SessionResult<T>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Completion<T> {
    /// Creates an unresolved completion.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Creates a completion that already holds `result`.
    pub fn resolved(result: SessionResult<T>) -> Self {
        let (tx, _) = watch::channel(Some(result));
        Self { slot: Arc::new(tx) }
    }

    /// Writes `result`. Returns `false` if a result was already written.
    pub fn complete(&self, result: SessionResult<T>) -> bool {
        self.slot.send_if_modified(move |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        })
    }

    /// Writes a success value.
    pub fn succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Writes a failure.
    pub fn fail(&self, error: SessionError) -> bool {
        self.complete(Err(error))
    }

    /// Returns `true` once a result was written.
    pub fn is_complete(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// The result, if already written. Never blocks.
    pub fn try_get(&self) -> Option<SessionResult<T>> {
        self.slot.borrow().clone()
    }

    /// Waits for the result.
    ///
    /// The returned future does not borrow `self`.
    pub fn wait(&self) -> impl Future<Output = SessionResult<T>> + Send + 'static {
        let mut rx = self.slot.subscribe();
        async move {
            match rx.wait_for(Option::is_some).await {
                Ok(slot) => slot.clone().unwrap_or(Err(SessionError::Terminated)),
                Err(_) => Err(SessionError::Terminated),
            }
        }
    }

    /// Returns `true` if both values share the same slot.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.slot.borrow().is_some())
            .finish()
    }
}

// =============================================================================
// Reply
// =============================================================================

/// The answer slot carried by a user event.
pub struct Reply<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> Reply<T> {
    /// Creates a reply slot and the receiver the caller awaits.
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sends `value`. Returns `false` if already sent or the caller went away.
    pub fn send(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Returns `true` once a value was sent.
    pub fn is_sent(&self) -> bool {
        self.tx.is_none()
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply").field("sent", &self.is_sent()).finish()
    }
}
