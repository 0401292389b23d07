// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reconnect delay policy.

use std::time::Duration;

/// Exponential reconnect backoff.
///
/// The first failure waits `initial`. Each consecutive failure doubles the
/// previous wait, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a policy. `max` is raised to `initial` if it is shorter.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// The wait that follows `current`, where `None` means no failure yet.
    pub fn next(&self, current: Option<Duration>) -> Duration {
        match current {
            None => self.initial,
            Some(wait) => wait.saturating_mul(2).min(self.max),
        }
    }

    /// First wait of a failure sequence.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Upper bound.
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(16))
    }
}
