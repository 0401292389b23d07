// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for keep-alive monitoring, service faults and activity listeners.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ualink_session::{
    ServerState, ServiceFaultListener, Session, SessionActivityListener, SessionFsm,
    SessionState, StatusCode,
};
use ualink_tests::prelude::*;

use SessionState::*;

/// Fires one keep-alive round and waits until its probe has been answered.
async fn probe(h: &SessionHarness) {
    let before = h.transport.probe_count();
    assert_eq!(h.scheduler.tick(), 1, "expected one keep-alive timer");
    let transport = Arc::clone(&h.transport);
    wait_until("keep-alive probe", || transport.probe_count() > before).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn wait_for_failures(fsm: &SessionFsm, count: u64) {
    wait_until(&format!("{count} keep-alive failures"), || {
        fsm.keep_alive_failure_count() == count
    })
    .await;
}

/// Reads the controller back from inside its activity callbacks.
struct QueryingListener {
    fsm: SessionFsm,
    observed: Mutex<Vec<String>>,
}

impl QueryingListener {
    fn new(fsm: SessionFsm) -> Self {
        Self {
            fsm,
            observed: Mutex::new(Vec::new()),
        }
    }

    fn observed(&self) -> Vec<String> {
        self.observed.lock().clone()
    }
}

impl SessionActivityListener for QueryingListener {
    fn on_session_active(&self, session: &Session) {
        let current = self.fsm.try_get_session().is_some_and(|s| s.same_as(session));
        let failures = self.fsm.keep_alive_failure_count();
        let wait = self.fsm.wait_time();
        self.observed.lock().push(format!(
            "active:{}:{current}:{failures}:{wait:?}",
            session.session_id()
        ));
    }

    fn on_session_inactive(&self, session: &Session) {
        let current = self.fsm.try_get_session().is_some();
        self.observed
            .lock()
            .push(format!("inactive:{}:{current}", session.session_id()));
    }
}

// =============================================================================
// Keep-Alive
// =============================================================================

#[tokio::test]
async fn test_keep_alive_timer_follows_active_state() {
    let h = SessionHarness::new();
    assert_eq!(h.scheduler.active_repeating(), 0);

    h.open().await;
    assert_eq!(
        h.scheduler.repeating_intervals(),
        vec![h.fsm.config().keep_alive_interval]
    );

    h.fsm.close_session().await.expect("close");
    h.wait_for_state(Inactive).await;
    assert_eq!(h.scheduler.active_repeating(), 0);
}

#[tokio::test]
async fn test_successful_probes_keep_session() {
    let h = SessionHarness::new();
    let session = h.open().await;

    for _ in 0..3 {
        probe(&h).await;
    }

    assert_state(&h.fsm, Active);
    assert_eq!(h.transport.probe_count(), 3);
    assert_eq!(h.fsm.keep_alive_failure_count(), 0);
    assert!(h.fsm.try_get_session().is_some_and(|s| s.same_as(&session)));
}

#[tokio::test]
async fn test_non_running_server_state_is_not_a_failure() {
    let h = SessionHarness::new();
    h.open().await;
    h.transport.set_server_state(ServerState::Suspended);

    probe(&h).await;

    assert_state(&h.fsm, Active);
    assert_eq!(h.fsm.keep_alive_failure_count(), 0);
}

#[tokio::test]
async fn test_failures_beyond_allowance_drop_session() {
    let h = SessionHarness::with_config(ConfigFixtures::with_keep_alive_failures_allowed(3));
    let lost = h.open().await;
    h.transport.set_fail_probes(true);

    for n in 1..=3 {
        probe(&h).await;
        wait_for_failures(&h.fsm, n).await;
        assert_state(&h.fsm, Active);
    }

    assert_eq!(h.scheduler.tick(), 1);
    h.wait_for_state(CreatingWait).await;
    h.wait_for_backoff(1).await;

    assert_eq!(h.scheduler.active_repeating(), 0);
    assert_wait_secs(&h.fsm, 1);
    assert_eq!(h.fsm.stats().keep_alive_failures(), 4);
    assert_eq!(h.fsm.stats().reconnections(), 1);

    h.transport.set_fail_probes(false);
    assert!(h.scheduler.fire_next());
    h.wait_for_state(Active).await;

    let current = h.fsm.try_get_session().expect("reconnected");
    assert!(!current.same_as(&lost));
    assert_eq!(h.fsm.keep_alive_failure_count(), 0);
}

#[tokio::test]
async fn test_successful_probe_resets_failure_count() {
    let h = SessionHarness::with_config(ConfigFixtures::with_keep_alive_failures_allowed(3));
    h.open().await;

    h.transport.set_fail_probes(true);
    for n in 1..=3 {
        probe(&h).await;
        wait_for_failures(&h.fsm, n).await;
    }

    h.transport.set_fail_probes(false);
    probe(&h).await;
    wait_for_failures(&h.fsm, 0).await;

    h.transport.set_fail_probes(true);
    for n in 1..=3 {
        probe(&h).await;
        wait_for_failures(&h.fsm, n).await;
    }

    assert_state(&h.fsm, Active);
    assert_eq!(h.recorder.entries(CreatingWait), 0);
}

#[tokio::test]
async fn test_default_allowance_tolerates_one_failure() {
    let h = SessionHarness::new();
    h.open().await;
    h.transport.set_fail_probes(true);

    probe(&h).await;
    wait_for_failures(&h.fsm, 1).await;
    assert_state(&h.fsm, Active);

    assert_eq!(h.scheduler.tick(), 1);
    h.wait_for_state(CreatingWait).await;
}

// =============================================================================
// Service Faults
// =============================================================================

#[tokio::test]
async fn test_session_fault_triggers_reconnect() {
    let h = SessionHarness::new();
    h.open().await;

    h.fsm
        .fault_listener()
        .on_service_fault(StatusCode::Bad_SessionIdInvalid);
    h.wait_for_state(CreatingWait).await;

    assert!(h.fsm.try_get_session().is_none());
    assert_eq!(h.fsm.stats().reconnections(), 1);
}

#[tokio::test]
async fn test_secure_channel_fault_triggers_reconnect() {
    let h = SessionHarness::new();
    h.open().await;

    h.fsm
        .fault_listener()
        .on_service_fault(StatusCode::Bad_SecureChannelIdInvalid);

    h.wait_for_state(CreatingWait).await;
}

#[tokio::test]
async fn test_unrelated_fault_is_ignored() {
    let h = SessionHarness::new();
    h.open().await;

    let listener = h.fsm.fault_listener();
    listener.on_service_fault(StatusCode::Bad_Timeout);
    listener.on_service_fault(StatusCode::Bad_NotImplemented);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_state(&h.fsm, Active);
    assert_eq!(h.recorder.entries(CreatingWait), 0);
}

#[tokio::test]
async fn test_fault_outside_active_is_ignored() {
    let h = SessionHarness::new();

    h.fsm
        .fault_listener()
        .on_service_fault(StatusCode::Bad_SessionClosed);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_trace(&h.recorder.trace(), &[Inactive]);
}

#[tokio::test]
async fn test_fault_listener_survives_dropped_controller() {
    let h = SessionHarness::new();
    let listener = h.fsm.fault_listener();

    let SessionHarness { fsm, .. } = h;
    drop(fsm);

    listener.on_service_fault(StatusCode::Bad_SessionClosed);
}

// =============================================================================
// Activity Listeners
// =============================================================================

#[tokio::test]
async fn test_activity_listeners_see_every_session() {
    let h = SessionHarness::new();
    let listener = Arc::new(RecordingListener::new());
    h.fsm.add_activity_listener(listener.clone());

    let first = h.open().await;
    h.fsm
        .fault_listener()
        .on_service_fault(StatusCode::Bad_SessionClosed);
    h.wait_for_backoff(1).await;
    assert!(h.scheduler.fire_next());
    h.wait_for_state(Active).await;
    let second = h.fsm.try_get_session().expect("reconnected");

    assert_eq!(
        listener.events(),
        vec![
            format!("active:{}", first.session_id()),
            format!("inactive:{}", first.session_id()),
            format!("active:{}", second.session_id()),
        ]
    );
}

#[tokio::test]
async fn test_removed_activity_listener_is_silent() {
    let h = SessionHarness::new();
    let listener = Arc::new(RecordingListener::new());
    let registered: Arc<dyn SessionActivityListener> = listener.clone();
    h.fsm.add_activity_listener(Arc::clone(&registered));

    assert!(h.fsm.remove_activity_listener(&registered));
    h.open().await;

    assert!(listener.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activity_listener_may_query_controller() {
    let h = SessionHarness::new();
    let listener = Arc::new(QueryingListener::new(h.fsm.clone()));
    let registered: Arc<dyn SessionActivityListener> = listener.clone();
    h.fsm.add_activity_listener(Arc::clone(&registered));

    let session = h.open().await;
    within(h.fsm.close_session()).await.expect("close");
    h.wait_for_state(Inactive).await;

    assert_eq!(
        listener.observed(),
        vec![
            format!("active:{}:true:0:None", session.session_id()),
            format!("inactive:{}:false", session.session_id()),
        ]
    );
    assert!(h.fsm.remove_activity_listener(&registered));
}
