// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for one session controller.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// CreateSession calls issued.
    create_attempts: AtomicU64,

    /// Sessions that reached `Active`.
    activations: AtomicU64,

    /// Establishment attempts that ended in `CreatingWait`.
    failures: AtomicU64,

    /// Departures from `Active` caused by keep-alive failure or service fault.
    reconnections: AtomicU64,

    /// Sessions closed on request.
    closes: AtomicU64,

    /// Individual keep-alive probe failures.
    keep_alive_failures: AtomicU64,
}

impl SessionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a CreateSession call.
    pub fn record_create_attempt(&self) {
        self.create_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session reaching `Active`.
    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed establishment attempt.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a reconnection.
    pub fn record_reconnection(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed close.
    pub fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed keep-alive probe.
    pub fn record_keep_alive_failure(&self) {
        self.keep_alive_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of CreateSession calls.
    pub fn create_attempts(&self) -> u64 {
        self.create_attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of activations.
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Returns the number of failed establishment attempts.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the number of reconnections.
    pub fn reconnections(&self) -> u64 {
        self.reconnections.load(Ordering::Relaxed)
    }

    /// Returns the number of closes.
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }

    /// Returns the number of failed keep-alive probes.
    pub fn keep_alive_failures(&self) -> u64 {
        self.keep_alive_failures.load(Ordering::Relaxed)
    }

    /// Resets all statistics.
    pub fn reset(&self) {
        self.create_attempts.store(0, Ordering::Relaxed);
        self.activations.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.reconnections.store(0, Ordering::Relaxed);
        self.closes.store(0, Ordering::Relaxed);
        self.keep_alive_failures.store(0, Ordering::Relaxed);
    }
}
