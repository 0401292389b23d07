// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Timers and task spawning used by the session state machine.
//!
//! The controller never touches the clock directly. Everything time-based goes
//! through a [`Scheduler`], so tests can drive timers by hand.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};

// =============================================================================
// TimerHandle
// =============================================================================

/// Cancels a scheduled timer when cancelled or dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// Wraps a cancellation callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that cancels nothing.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancels the timer.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Source of timers and background tasks.
pub trait Scheduler: Send + Sync + 'static {
    /// Runs `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle;

    /// Runs `task` every `interval`, first after one full interval.
    ///
    /// Ticks are spaced at least `interval` apart; missed ticks are not
    /// caught up.
    fn schedule_repeating(&self, interval: Duration, task: Box<dyn Fn() + Send + Sync>) -> TimerHandle;

    /// Runs `future` in the background.
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// [`Scheduler`] backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Binds to the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Binds to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let join = self.handle.spawn(async move {
            time::sleep(delay).await;
            task();
        });
        TimerHandle::new(move || join.abort())
    }

    fn schedule_repeating(&self, interval: Duration, task: Box<dyn Fn() + Send + Sync>) -> TimerHandle {
        let join = self.handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });
        TimerHandle::new(move || join.abort())
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.handle.spawn(future);
    }
}
