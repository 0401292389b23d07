// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A session controller wired to mock collaborators, plus polling helpers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ualink_session::{Session, SessionConfig, SessionFsm, SessionState, TransferPolicy};

use super::fixtures::ConfigFixtures;
use super::mocks::{ManualScheduler, RecordingSubscriptions, ScriptedTransport};

/// Upper bound for every `wait_*` helper.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Waiting
// =============================================================================

/// Polls `condition` until it holds.
///
/// # Panics
///
/// Panics after [`WAIT_TIMEOUT`].
pub async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {description}");
}

/// Awaits `future`, failing the test after [`WAIT_TIMEOUT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(WAIT_TIMEOUT, future).await {
        Ok(output) => output,
        Err(_) => panic!("future did not complete within {WAIT_TIMEOUT:?}"),
    }
}

// =============================================================================
// State Recorder
// =============================================================================

/// Records the state trace of a controller, starting with its initial state.
#[derive(Clone)]
pub struct StateRecorder {
    trace: Arc<Mutex<Vec<SessionState>>>,
}

impl StateRecorder {
    /// Attaches to `fsm`.
    pub fn attach(fsm: &SessionFsm) -> Self {
        let trace = Arc::new(Mutex::new(vec![fsm.state()]));
        let sink = Arc::clone(&trace);
        fsm.add_transition_listener(move |_, to, _| sink.lock().push(to));
        Self { trace }
    }

    /// States visited so far.
    pub fn trace(&self) -> Vec<SessionState> {
        self.trace.lock().clone()
    }

    /// How often `state` was entered.
    pub fn entries(&self, state: SessionState) -> usize {
        self.trace.lock().iter().skip(1).filter(|s| **s == state).count()
    }
}

// =============================================================================
// Session Harness
// =============================================================================

/// A controller with scripted transport, manual timers and recorded states.
pub struct SessionHarness {
    /// The controller under test.
    pub fsm: SessionFsm,
    /// Its transport.
    pub transport: Arc<ScriptedTransport>,
    /// Its scheduler.
    pub scheduler: Arc<ManualScheduler>,
    /// Its subscription registry.
    pub subscriptions: Arc<RecordingSubscriptions>,
    /// Its state trace.
    pub recorder: StateRecorder,
}

impl SessionHarness {
    /// A harness with default configuration and no subscriptions.
    pub fn new() -> Self {
        Self::with_config(ConfigFixtures::default_config())
    }

    /// A harness with `config` and no subscriptions.
    pub fn with_config(config: SessionConfig) -> Self {
        Self::build(config, RecordingSubscriptions::default(), TransferPolicy::default())
    }

    /// A harness whose registry holds `ids`.
    pub fn with_subscriptions(ids: impl IntoIterator<Item = u32>, policy: TransferPolicy) -> Self {
        Self::build(
            ConfigFixtures::default_config(),
            RecordingSubscriptions::with_ids(ids),
            policy,
        )
    }

    fn build(
        config: SessionConfig,
        subscriptions: RecordingSubscriptions,
        policy: TransferPolicy,
    ) -> Self {
        super::init_test_logging();

        let transport = Arc::new(ScriptedTransport::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let subscriptions = Arc::new(subscriptions);

        let fsm = SessionFsm::builder(config, transport.clone())
            .scheduler(scheduler.clone())
            .subscriptions(subscriptions.clone())
            .transfer_policy(policy)
            .build()
            .expect("valid test configuration");
        let recorder = StateRecorder::attach(&fsm);

        Self {
            fsm,
            transport,
            scheduler,
            subscriptions,
            recorder,
        }
    }

    /// Waits until the controller is in `state`.
    pub async fn wait_for_state(&self, state: SessionState) {
        let fsm = &self.fsm;
        wait_until(&format!("state {state}"), || fsm.state() == state).await;
    }

    /// Waits until the `n`th backoff timer has been scheduled.
    pub async fn wait_for_backoff(&self, n: usize) {
        let scheduler = &self.scheduler;
        wait_until(&format!("backoff timer #{n}"), || {
            scheduler.scheduled_delays().len() >= n
        })
        .await;
    }

    /// Opens a session and waits for it.
    pub async fn open(&self) -> Session {
        within(self.fsm.open_session())
            .await
            .expect("session establishment succeeds")
    }
}

impl Default for SessionHarness {
    fn default() -> Self {
        Self::new()
    }
}
