// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Mock collaborators for driving a session controller in isolation.
//!
//! ## Design Principles
//!
//! - Scripted results for every collaborator call
//! - Call counters for verification
//! - Gates that hold a call open until the test releases it
//! - Timers that only fire when the test says so

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;

use ualink_session::{
    ActivateSessionResult, CreateSessionRequest, CreateSessionResult, NodeId, Scheduler,
    ServerState, Session, SessionActivityListener, SessionInitializer, SessionTransport,
    StatusCode, SubscriptionId, SubscriptionRegistry, TimerHandle, UaError, UaResult,
};

// =============================================================================
// Gate
// =============================================================================

/// Holds async calls until opened. Starts open.
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    /// Creates an open gate.
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self { open }
    }

    /// Makes subsequent calls wait.
    pub fn close(&self) {
        self.open.send_replace(false);
    }

    /// Releases every waiting call.
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Waits until the gate is open.
    pub async fn pass(&self) {
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Scripted Transport
// =============================================================================

/// A session transport with scripted outcomes.
#[derive(Debug)]
pub struct ScriptedTransport {
    /// Fail this many upcoming CreateSession calls.
    create_failures: AtomicU32,
    fail_activate: AtomicBool,
    fail_probes: AtomicBool,
    fail_close: AtomicBool,
    server_state: Mutex<ServerState>,
    transfer_outcome: Mutex<Option<UaResult<Vec<StatusCode>>>>,

    /// Gate passed by every CreateSession call.
    pub create_gate: Gate,
    /// Gate passed by every ActivateSession call.
    pub activate_gate: Gate,
    /// Gate passed by every TransferSubscriptions call.
    pub transfer_gate: Gate,

    create_count: AtomicU64,
    activate_count: AtomicU64,
    transfer_count: AtomicU64,
    probe_count: AtomicU64,
    close_count: AtomicU64,
    next_session_id: AtomicU32,
    requests: Mutex<Vec<CreateSessionRequest>>,
    transferred: Mutex<Vec<Vec<SubscriptionId>>>,
}

impl ScriptedTransport {
    /// Creates a transport on which every call succeeds.
    pub fn new() -> Self {
        Self {
            create_failures: AtomicU32::new(0),
            fail_activate: AtomicBool::new(false),
            fail_probes: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            server_state: Mutex::new(ServerState::Running),
            transfer_outcome: Mutex::new(None),
            create_gate: Gate::new(),
            activate_gate: Gate::new(),
            transfer_gate: Gate::new(),
            create_count: AtomicU64::new(0),
            activate_count: AtomicU64::new(0),
            transfer_count: AtomicU64::new(0),
            probe_count: AtomicU64::new(0),
            close_count: AtomicU64::new(0),
            next_session_id: AtomicU32::new(1),
            requests: Mutex::new(Vec::new()),
            transferred: Mutex::new(Vec::new()),
        }
    }

    /// Fails the next `count` CreateSession calls.
    pub fn fail_creates(&self, count: u32) {
        self.create_failures.store(count, Ordering::SeqCst);
    }

    /// Fails every ActivateSession call while set.
    pub fn set_fail_activate(&self, fail: bool) {
        self.fail_activate.store(fail, Ordering::SeqCst);
    }

    /// Fails every keep-alive probe while set.
    pub fn set_fail_probes(&self, fail: bool) {
        self.fail_probes.store(fail, Ordering::SeqCst);
    }

    /// Fails every CloseSession call while set.
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Server state reported by keep-alive probes.
    pub fn set_server_state(&self, state: ServerState) {
        *self.server_state.lock() = state;
    }

    /// Answers TransferSubscriptions with `outcome` instead of all-good results.
    pub fn set_transfer_outcome(&self, outcome: UaResult<Vec<StatusCode>>) {
        *self.transfer_outcome.lock() = Some(outcome);
    }

    /// CreateSession calls so far.
    pub fn create_count(&self) -> u64 {
        self.create_count.load(Ordering::SeqCst)
    }

    /// ActivateSession calls so far.
    pub fn activate_count(&self) -> u64 {
        self.activate_count.load(Ordering::SeqCst)
    }

    /// TransferSubscriptions calls so far.
    pub fn transfer_count(&self) -> u64 {
        self.transfer_count.load(Ordering::SeqCst)
    }

    /// Keep-alive probes so far.
    pub fn probe_count(&self) -> u64 {
        self.probe_count.load(Ordering::SeqCst)
    }

    /// CloseSession calls so far.
    pub fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Every CreateSession request received.
    pub fn requests(&self) -> Vec<CreateSessionRequest> {
        self.requests.lock().clone()
    }

    /// Subscription ids of every TransferSubscriptions call.
    pub fn transferred(&self) -> Vec<Vec<SubscriptionId>> {
        self.transferred.lock().clone()
    }

    fn take_create_failure(&self) -> bool {
        self.create_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn create_session(&self, request: &CreateSessionRequest) -> UaResult<CreateSessionResult> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        self.create_gate.pass().await;

        if self.take_create_failure() {
            return Err(UaError::new(StatusCode::Bad_Timeout, "scripted create failure"));
        }

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        Ok(CreateSessionResult {
            session_id: NodeId::numeric(1, id),
            authentication_token: NodeId::string(0, format!("token-{id}")),
            revised_session_timeout: request.requested_session_timeout,
            server_nonce: vec![7; 32],
            server_certificate: None,
            max_request_message_size: 0,
        })
    }

    async fn activate_session(
        &self,
        _request: &CreateSessionRequest,
        _created: &CreateSessionResult,
    ) -> UaResult<ActivateSessionResult> {
        self.activate_count.fetch_add(1, Ordering::SeqCst);
        self.activate_gate.pass().await;
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(UaError::new(
                StatusCode::Bad_SecurityChecksFailed,
                "scripted activate failure",
            ));
        }
        Ok(ActivateSessionResult {
            server_nonce: vec![9; 32],
        })
    }

    async fn transfer_subscriptions(
        &self,
        _session: &Session,
        subscription_ids: &[SubscriptionId],
    ) -> UaResult<Vec<StatusCode>> {
        self.transfer_count.fetch_add(1, Ordering::SeqCst);
        self.transferred.lock().push(subscription_ids.to_vec());
        self.transfer_gate.pass().await;
        match self.transfer_outcome.lock().clone() {
            Some(outcome) => outcome,
            None => Ok(vec![StatusCode::Good; subscription_ids.len()]),
        }
    }

    async fn read_server_state(&self, _session: &Session) -> UaResult<ServerState> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(UaError::new(StatusCode::Bad_Timeout, "scripted probe failure"));
        }
        Ok(*self.server_state.lock())
    }

    async fn close_session(&self, _session: &Session) -> UaResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(UaError::new(StatusCode::Bad_ConnectionClosed, "scripted close failure"));
        }
        Ok(())
    }
}

// =============================================================================
// Manual Scheduler
// =============================================================================

struct OnceTimer {
    task: Box<dyn FnOnce() + Send>,
    cancelled: Arc<AtomicBool>,
}

struct RepeatingTimer {
    interval: Duration,
    task: Arc<dyn Fn() + Send + Sync>,
    cancelled: Arc<AtomicBool>,
}

/// A scheduler whose timers fire only when the test asks.
///
/// Background tasks still run on the tokio runtime.
#[derive(Default)]
pub struct ManualScheduler {
    once: Mutex<VecDeque<OnceTimer>>,
    repeating: Mutex<Vec<RepeatingTimer>>,
    delays: Mutex<Vec<Duration>>,
}

impl ManualScheduler {
    /// Creates a scheduler with no timers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of every one-shot timer scheduled so far, cancelled ones included.
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// One-shot timers neither fired nor cancelled.
    pub fn pending_once(&self) -> usize {
        self.once
            .lock()
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Repeating timers not cancelled.
    pub fn active_repeating(&self) -> usize {
        self.repeating
            .lock()
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Intervals of the repeating timers not cancelled.
    pub fn repeating_intervals(&self) -> Vec<Duration> {
        self.repeating
            .lock()
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.interval)
            .collect()
    }

    /// Fires the oldest pending one-shot timer. Returns `false` if there was none.
    pub fn fire_next(&self) -> bool {
        let next = {
            let mut once = self.once.lock();
            loop {
                match once.pop_front() {
                    Some(timer) if timer.cancelled.load(Ordering::SeqCst) => continue,
                    other => break other,
                }
            }
        };
        match next {
            Some(timer) => {
                (timer.task)();
                true
            }
            None => false,
        }
    }

    /// Fires every active repeating timer once. Returns how many fired.
    pub fn tick(&self) -> usize {
        let tasks: Vec<_> = self
            .repeating
            .lock()
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| Arc::clone(&timer.task))
            .collect();
        for task in &tasks {
            task();
        }
        tasks.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.delays.lock().push(delay);
        self.once.lock().push_back(OnceTimer {
            task,
            cancelled: Arc::clone(&cancelled),
        });
        TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }

    fn schedule_repeating(&self, interval: Duration, task: Box<dyn Fn() + Send + Sync>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.repeating.lock().push(RepeatingTimer {
            interval,
            task: Arc::from(task),
            cancelled: Arc::clone(&cancelled),
        });
        TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        tokio::spawn(future);
    }
}

// =============================================================================
// Recording Collaborators
// =============================================================================

/// Subscription registry with a fixed id list that records transfer failures.
#[derive(Debug, Default)]
pub struct RecordingSubscriptions {
    ids: Mutex<Vec<SubscriptionId>>,
    failed: Mutex<Vec<(SubscriptionId, StatusCode)>>,
}

impl RecordingSubscriptions {
    /// Creates a registry holding `ids`.
    pub fn with_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().map(SubscriptionId).collect()),
            failed: Mutex::new(Vec::new()),
        }
    }

    /// Every reported transfer failure.
    pub fn failed(&self) -> Vec<(SubscriptionId, StatusCode)> {
        self.failed.lock().clone()
    }
}

impl SubscriptionRegistry for RecordingSubscriptions {
    fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.ids.lock().clone()
    }

    fn transfer_failed(&self, subscription_id: SubscriptionId, status: StatusCode) {
        self.failed.lock().push((subscription_id, status));
    }
}

/// Records activity callbacks as `active:<id>` / `inactive:<id>`.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded callbacks in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl SessionActivityListener for RecordingListener {
    fn on_session_active(&self, session: &Session) {
        self.events
            .lock()
            .push(format!("active:{}", session.session_id()));
    }

    fn on_session_inactive(&self, session: &Session) {
        self.events
            .lock()
            .push(format!("inactive:{}", session.session_id()));
    }
}

/// Initializer that counts calls and can be failed or held open.
#[derive(Debug, Default)]
pub struct ScriptedInitializer {
    calls: AtomicU64,
    fail: AtomicBool,
    /// Gate passed by every call.
    pub gate: Gate,
}

impl ScriptedInitializer {
    /// Creates an initializer that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call while set.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionInitializer for ScriptedInitializer {
    async fn initialize(&self, _transport: &dyn SessionTransport, _session: &Session) -> UaResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(UaError::new(StatusCode::Bad_UnexpectedError, "scripted initializer failure"));
        }
        Ok(())
    }
}
