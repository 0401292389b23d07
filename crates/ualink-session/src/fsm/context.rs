// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

use std::time::Duration;

use crate::completion::Completion;
use crate::scheduler::TimerHandle;
use crate::types::Session;

/// Per-instance scratch state of a session state machine.
///
/// Only actions touch it. An empty slot reads as its default: no wait time,
/// zero keep-alive failures, no timers.
#[derive(Debug, Default)]
pub(crate) struct SessionContext {
    /// Current reconnect backoff. Cleared when the session becomes active.
    pub(crate) wait_time: Option<Duration>,
    pub(crate) wait_timer: Option<TimerHandle>,

    /// Future shared by every caller waiting for a session.
    pub(crate) session_completion: Option<Completion<Session>>,
    pub(crate) close_completion: Option<Completion<()>>,

    pub(crate) keep_alive_failures: u64,
    pub(crate) keep_alive_timer: Option<TimerHandle>,

    pub(crate) session: Option<Session>,
}

impl SessionContext {
    /// The pending session completion, created on first use.
    pub(crate) fn session_completion(&mut self) -> Completion<Session> {
        self.session_completion
            .get_or_insert_with(Completion::new)
            .clone()
    }

    /// The pending close completion, created on first use.
    pub(crate) fn close_completion(&mut self) -> Completion<()> {
        self.close_completion
            .get_or_insert_with(Completion::new)
            .clone()
    }

    /// Returns `true` if `session` is the one currently held.
    pub(crate) fn is_current(&self, session: &Session) -> bool {
        self.session
            .as_ref()
            .is_some_and(|current| current.same_as(session))
    }
}
