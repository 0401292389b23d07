// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for session establishment, coalescing, backoff and close.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use ualink_session::{
    ServiceFaultListener, SessionError, SessionInitializer, SessionState, StatusCode, SubscriptionId, TransferPolicy,
    UaError,
};
use ualink_tests::prelude::*;

use SessionState::*;

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

/// Lets spawned collaborator calls and queued events settle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// =============================================================================
// Establishment
// =============================================================================

#[tokio::test]
async fn test_open_session_walks_every_establishing_state() {
    let h = SessionHarness::new();

    let session = h.open().await;

    assert_state(&h.fsm, Active);
    assert_trace(
        &h.recorder.trace(),
        &[Inactive, Creating, Activating, Transferring, Initializing, Active],
    );
    assert_eq!(h.transport.create_count(), 1);
    assert_eq!(h.transport.activate_count(), 1);
    assert_eq!(h.fsm.wait_time(), None);
    assert_eq!(session.endpoint_url(), TEST_ENDPOINT);
    assert_eq!(h.fsm.stats().activations(), 1);
}

#[tokio::test]
async fn test_create_request_carries_configuration() {
    let h = SessionHarness::with_config(ConfigFixtures::named("line-3"));

    let session = h.open().await;

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].session_name, "line-3");
    assert_eq!(requests[0].endpoint_url, TEST_ENDPOINT);
    assert_eq!(requests[0].client_nonce.len(), 32);
    assert_eq!(session.session_name(), "line-3");
}

#[tokio::test]
async fn test_generated_session_names_differ_per_attempt() {
    let h = SessionHarness::new();
    h.transport.fail_creates(1);

    let first = h.fsm.open_session();
    assert_failed_with(&within(first).await, "create");
    h.wait_for_backoff(1).await;
    assert!(h.scheduler.fire_next());
    h.open().await;

    let names: Vec<_> = h.transport.requests().into_iter().map(|r| r.session_name).collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|name| name.starts_with("UaSession:")));
    assert_ne!(names[0], names[1]);
}

#[tokio::test]
async fn test_concurrent_opens_share_one_attempt() {
    let h = SessionHarness::new();
    h.transport.create_gate.close();

    let callers: Vec<_> = (0..5).map(|_| tokio::spawn(h.fsm.open_session())).collect();
    let transport = Arc::clone(&h.transport);
    wait_until("create call", || transport.create_count() == 1).await;
    settle().await;
    h.transport.create_gate.open();

    let mut sessions = Vec::new();
    for caller in callers {
        let session = within(caller).await.expect("caller task").expect("session");
        sessions.push(session);
    }

    assert_eq!(h.transport.create_count(), 1);
    assert!(sessions.windows(2).all(|pair| pair[0].same_as(&pair[1])));
    assert_eq!(h.recorder.entries(Creating), 1);
}

#[tokio::test]
async fn test_open_while_active_returns_current_session() {
    let h = SessionHarness::new();
    let first = h.open().await;

    let second = h.open().await;

    assert!(first.same_as(&second));
    assert_eq!(h.transport.create_count(), 1);
}

#[tokio::test]
async fn test_get_session_resolves_immediately_while_active() {
    let h = SessionHarness::new();
    let session = h.open().await;

    let fast = h
        .fsm
        .get_session()
        .now_or_never()
        .expect("resolved on first poll")
        .expect("active session");

    assert!(fast.same_as(&session));
    assert!(h.fsm.try_get_session().is_some());
}

#[tokio::test]
async fn test_get_session_joins_pending_establishment() {
    let h = SessionHarness::new();
    h.transport.create_gate.close();

    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Creating).await;
    let getter = tokio::spawn(h.fsm.get_session());
    settle().await;
    h.transport.create_gate.open();

    let opened = within(opener).await.expect("task").expect("session");
    let got = within(getter).await.expect("task").expect("session");
    assert!(opened.same_as(&got));
}

// =============================================================================
// Inactive
// =============================================================================

#[tokio::test]
async fn test_get_session_fails_while_inactive() {
    let h = SessionHarness::new();

    let result = within(h.fsm.get_session()).await;

    assert_closed(&result);
    assert_state(&h.fsm, Inactive);
    assert_eq!(h.transport.create_count(), 0);
}

#[tokio::test]
async fn test_close_session_succeeds_while_inactive() {
    let h = SessionHarness::new();

    within(h.fsm.close_session()).await.expect("close");

    assert_state(&h.fsm, Inactive);
    assert_eq!(h.transport.create_count(), 0);
    assert_eq!(h.transport.close_count(), 0);
    assert_trace(&h.recorder.trace(), &[Inactive]);
}

// =============================================================================
// Backoff
// =============================================================================

#[tokio::test]
async fn test_failed_create_fails_callers_and_waits() {
    let h = SessionHarness::new();
    h.transport.fail_creates(2);

    let result = within(h.fsm.open_session()).await;
    assert_failed_with(&result, "create");
    h.wait_for_backoff(1).await;
    assert_wait_secs(&h.fsm, 1);

    assert!(h.scheduler.fire_next());
    h.wait_for_backoff(2).await;
    assert_wait_secs(&h.fsm, 2);

    let getter = tokio::spawn(h.fsm.get_session());
    settle().await;
    assert!(h.scheduler.fire_next());
    h.wait_for_state(Active).await;

    let session = within(getter).await.expect("task").expect("session");
    assert!(h.fsm.try_get_session().is_some_and(|s| s.same_as(&session)));
    assert_eq!(h.fsm.wait_time(), None);
    assert_eq!(h.scheduler.scheduled_delays(), secs(&[1, 2]));
    assert_trace(
        &h.recorder.trace(),
        &[
            Inactive,
            Creating,
            CreatingWait,
            Creating,
            CreatingWait,
            Creating,
            Activating,
            Transferring,
            Initializing,
            Active,
        ],
    );
    assert_eq!(h.fsm.stats().create_attempts(), 3);
    assert_eq!(h.fsm.stats().failures(), 2);
}

#[tokio::test]
async fn test_backoff_doubles_up_to_max_wait() {
    let h = SessionHarness::new();
    h.transport.fail_creates(6);

    let _ = within(h.fsm.open_session()).await;
    for n in 1..=5 {
        h.wait_for_backoff(n).await;
        assert!(h.scheduler.fire_next());
    }
    h.wait_for_backoff(6).await;

    assert_eq!(h.scheduler.scheduled_delays(), secs(&[1, 2, 4, 8, 16, 16]));
    assert_wait_secs(&h.fsm, 16);
}

#[tokio::test]
async fn test_backoff_resets_after_session_becomes_active() {
    let h = SessionHarness::new();
    h.transport.fail_creates(3);

    let _ = within(h.fsm.open_session()).await;
    for n in 1..=3 {
        h.wait_for_backoff(n).await;
        assert!(h.scheduler.fire_next());
    }
    h.wait_for_state(Active).await;
    assert_eq!(h.fsm.wait_time(), None);

    h.fsm.fault_listener().on_service_fault(StatusCode::Bad_SessionIdInvalid);
    h.wait_for_backoff(4).await;

    assert_eq!(h.scheduler.scheduled_delays(), secs(&[1, 2, 4, 1]));
    assert_wait_secs(&h.fsm, 1);
}

#[tokio::test]
async fn test_activate_failure_waits_then_retries_from_create() {
    let h = SessionHarness::new();
    h.transport.set_fail_activate(true);

    let result = within(h.fsm.open_session()).await;
    assert_failed_with(&result, "activate");
    h.wait_for_backoff(1).await;

    h.transport.set_fail_activate(false);
    assert!(h.scheduler.fire_next());
    h.wait_for_state(Active).await;

    assert_eq!(h.transport.create_count(), 2);
    assert_eq!(h.transport.activate_count(), 2);
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test]
async fn test_close_active_session() {
    let h = SessionHarness::new();
    let listener = Arc::new(RecordingListener::new());
    h.fsm.add_activity_listener(listener.clone());
    let session = h.open().await;

    within(h.fsm.close_session()).await.expect("close");
    h.wait_for_state(Inactive).await;

    assert_eq!(h.transport.close_count(), 1);
    assert_eq!(h.scheduler.active_repeating(), 0);
    assert!(h.fsm.try_get_session().is_none());
    assert_eq!(
        listener.events(),
        vec![
            format!("active:{}", session.session_id()),
            format!("inactive:{}", session.session_id()),
        ]
    );
    assert_closed(&within(h.fsm.get_session()).await);
}

#[tokio::test]
async fn test_failed_close_still_reaches_inactive() {
    let h = SessionHarness::new();
    h.open().await;
    h.transport.set_fail_close(true);

    within(h.fsm.close_session()).await.expect("close");
    h.wait_for_state(Inactive).await;

    assert_eq!(h.transport.close_count(), 1);
}

#[tokio::test]
async fn test_close_during_creating_is_deferred() {
    let h = SessionHarness::new();
    h.transport.create_gate.close();

    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Creating).await;
    let closer = tokio::spawn(h.fsm.close_session());
    settle().await;
    assert_state(&h.fsm, Creating);

    h.transport.create_gate.open();

    within(opener).await.expect("task").expect("session");
    within(closer).await.expect("task").expect("close");
    h.wait_for_state(Inactive).await;

    assert_trace(
        &h.recorder.trace(),
        &[
            Inactive,
            Creating,
            Activating,
            Transferring,
            Initializing,
            Active,
            Closing,
            Inactive,
        ],
    );
    assert_eq!(h.transport.close_count(), 1);
}

#[tokio::test]
async fn test_close_during_activating_is_deferred() {
    let h = SessionHarness::new();
    h.transport.activate_gate.close();

    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Activating).await;
    let closer = tokio::spawn(h.fsm.close_session());
    settle().await;
    assert_state(&h.fsm, Activating);
    assert!(!closer.is_finished());

    h.transport.activate_gate.open();

    within(opener).await.expect("task").expect("session");
    within(closer).await.expect("task").expect("close");
    h.wait_for_state(Inactive).await;

    assert_trace(
        &h.recorder.trace(),
        &[
            Inactive,
            Creating,
            Activating,
            Transferring,
            Initializing,
            Active,
            Closing,
            Inactive,
        ],
    );
    assert_eq!(h.transport.close_count(), 1);
}

#[tokio::test]
async fn test_close_during_transferring_is_deferred() {
    let h = SessionHarness::with_subscriptions([7], TransferPolicy::default());
    h.transport.transfer_gate.close();

    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Transferring).await;
    let closer = tokio::spawn(h.fsm.close_session());
    settle().await;
    assert_state(&h.fsm, Transferring);
    assert!(!closer.is_finished());

    h.transport.transfer_gate.open();

    within(opener).await.expect("task").expect("session");
    within(closer).await.expect("task").expect("close");
    h.wait_for_state(Inactive).await;

    assert_trace(
        &h.recorder.trace(),
        &[
            Inactive,
            Creating,
            Activating,
            Transferring,
            Initializing,
            Active,
            Closing,
            Inactive,
        ],
    );
    assert_eq!(h.transport.transferred(), vec![vec![SubscriptionId(7)]]);
    assert_eq!(h.transport.close_count(), 1);
}

#[tokio::test]
async fn test_close_during_initializing_is_deferred() {
    let h = SessionHarness::new();
    let initializer = Arc::new(ScriptedInitializer::new());
    initializer.gate.close();
    h.fsm.add_initializer(initializer.clone());

    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Initializing).await;
    let closer = tokio::spawn(h.fsm.close_session());
    settle().await;
    assert_state(&h.fsm, Initializing);

    initializer.gate.open();

    within(opener).await.expect("task").expect("session");
    within(closer).await.expect("task").expect("close");
    h.wait_for_state(Inactive).await;
    assert_eq!(h.recorder.entries(Active), 1);
    assert_eq!(h.recorder.entries(Closing), 1);
}

#[tokio::test]
async fn test_close_during_creating_wait_abandons_reconnect() {
    let h = SessionHarness::new();
    h.transport.fail_creates(1);

    let _ = within(h.fsm.open_session()).await;
    h.wait_for_backoff(1).await;
    let getter = tokio::spawn(h.fsm.get_session());
    settle().await;

    within(h.fsm.close_session()).await.expect("close");
    h.wait_for_state(Inactive).await;

    assert_closed(&within(getter).await.expect("task"));
    assert_eq!(h.scheduler.pending_once(), 0);
    assert!(!h.scheduler.fire_next());
    assert_eq!(h.fsm.wait_time(), None);
    assert_eq!(h.transport.create_count(), 1);
}

#[tokio::test]
async fn test_close_after_failed_establishment_is_replayed() {
    let h = SessionHarness::new();
    h.transport.create_gate.close();
    h.transport.fail_creates(1);

    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Creating).await;
    let closer = tokio::spawn(h.fsm.close_session());
    settle().await;
    h.transport.create_gate.open();

    assert_failed_with(&within(opener).await.expect("task"), "create");
    within(closer).await.expect("task").expect("close");
    h.wait_for_state(Inactive).await;

    assert_eq!(h.scheduler.pending_once(), 0);
    assert_eq!(h.transport.close_count(), 0);
}

#[tokio::test]
async fn test_open_after_close_starts_new_session() {
    let h = SessionHarness::new();
    let first = h.open().await;
    within(h.fsm.close_session()).await.expect("close");
    h.wait_for_state(Inactive).await;

    let second = h.open().await;

    assert!(!first.same_as(&second));
    assert_eq!(h.transport.create_count(), 2);
}

#[tokio::test]
async fn test_open_during_closing_is_replayed_after_close() {
    let h = SessionHarness::new();
    h.open().await;

    let closer = h.fsm.close_session();
    let opener = h.fsm.open_session();
    within(closer).await.expect("close");
    let session = within(opener).await.expect("session");

    h.wait_for_state(Active).await;
    assert!(h.fsm.try_get_session().is_some_and(|s| s.same_as(&session)));
    assert_eq!(h.recorder.entries(Closing), 1);
    assert_eq!(h.transport.create_count(), 2);
}

// =============================================================================
// Subscription Transfer
// =============================================================================

#[tokio::test]
async fn test_transfer_skipped_without_subscriptions() {
    let h = SessionHarness::new();

    h.open().await;

    assert_eq!(h.transport.transfer_count(), 0);
}

#[tokio::test]
async fn test_transfer_reports_failed_subscriptions() {
    let h = SessionHarness::with_subscriptions([1, 2, 3], TransferPolicy::default());
    h.transport
        .set_transfer_outcome(Ok(vec![StatusCode::Good, StatusCode::Bad_NotSupported]));

    h.open().await;

    assert_state(&h.fsm, Active);
    assert_eq!(
        h.transport.transferred(),
        vec![vec![SubscriptionId(1), SubscriptionId(2), SubscriptionId(3)]]
    );
    assert_eq!(
        h.subscriptions.failed(),
        vec![
            (SubscriptionId(2), StatusCode::Bad_NotSupported),
            (SubscriptionId(3), StatusCode::Bad_UnexpectedError),
        ]
    );
}

#[tokio::test]
async fn test_unsupported_transfer_drops_subscriptions() {
    let h = SessionHarness::with_subscriptions([4, 5], TransferPolicy::default());
    h.transport
        .set_transfer_outcome(Err(UaError::from_status(StatusCode::Bad_ServiceUnsupported)));

    h.open().await;

    assert_state(&h.fsm, Active);
    assert_eq!(
        h.subscriptions.failed(),
        vec![
            (SubscriptionId(4), StatusCode::Bad_ServiceUnsupported),
            (SubscriptionId(5), StatusCode::Bad_ServiceUnsupported),
        ]
    );
}

#[tokio::test]
async fn test_transfer_error_fails_establishment() {
    let h = SessionHarness::with_subscriptions([1], TransferPolicy::default());
    h.transport
        .set_transfer_outcome(Err(UaError::from_status(StatusCode::Bad_Timeout)));

    let result = within(h.fsm.open_session()).await;

    assert_failed_with(&result, "transfer");
    h.wait_for_backoff(1).await;
    assert_state(&h.fsm, CreatingWait);
    assert!(h.subscriptions.failed().is_empty());
}

#[tokio::test]
async fn test_custom_transfer_policy() {
    let policy = TransferPolicy::new(|status| status == StatusCode::Bad_Timeout);
    let h = SessionHarness::with_subscriptions([1], policy);
    h.transport
        .set_transfer_outcome(Err(UaError::from_status(StatusCode::Bad_Timeout)));

    h.open().await;

    assert_eq!(
        h.subscriptions.failed(),
        vec![(SubscriptionId(1), StatusCode::Bad_Timeout)]
    );
}

// =============================================================================
// Initializers
// =============================================================================

#[tokio::test]
async fn test_initializers_run_on_every_activation() {
    let h = SessionHarness::new();
    let initializer = Arc::new(ScriptedInitializer::new());
    h.fsm.add_initializer(initializer.clone());

    h.open().await;
    h.fsm.fault_listener().on_service_fault(StatusCode::Bad_SessionClosed);
    h.wait_for_backoff(1).await;
    assert!(h.scheduler.fire_next());
    h.wait_for_state(Active).await;
    let transport = Arc::clone(&h.transport);
    wait_until("second activation", || transport.activate_count() == 2).await;

    assert_eq!(initializer.calls(), 2);
}

#[tokio::test]
async fn test_initializer_failure_retries_establishment() {
    let h = SessionHarness::new();
    let initializer = Arc::new(ScriptedInitializer::new());
    initializer.set_fail(true);
    h.fsm.add_initializer(initializer.clone());

    let result = within(h.fsm.open_session()).await;
    assert_failed_with(&result, "initialize");
    h.wait_for_backoff(1).await;

    initializer.set_fail(false);
    assert!(h.scheduler.fire_next());
    h.wait_for_state(Active).await;

    assert_eq!(initializer.calls(), 2);
}

#[tokio::test]
async fn test_removed_initializer_is_not_called() {
    let h = SessionHarness::new();
    let initializer = Arc::new(ScriptedInitializer::new());
    let registered: Arc<dyn SessionInitializer> = initializer.clone();
    h.fsm.add_initializer(Arc::clone(&registered));

    assert!(h.fsm.remove_initializer(&registered));
    assert!(!h.fsm.remove_initializer(&registered));
    h.open().await;

    assert_eq!(initializer.calls(), 0);
}

#[tokio::test]
async fn test_slow_initializer_times_out() {
    let h = SessionHarness::with_config(ConfigFixtures::short_request_timeout());
    let initializer = Arc::new(ScriptedInitializer::new());
    initializer.gate.close();
    h.fsm.add_initializer(initializer.clone());

    let result = within(h.fsm.open_session()).await;

    match result {
        Err(SessionError::InitializeFailed(e)) => assert_eq!(e.status(), StatusCode::Bad_Timeout),
        other => panic!("expected an initializer timeout, got {other:?}"),
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_dropped_controller_terminates_callers() {
    let h = SessionHarness::new();
    h.transport.create_gate.close();
    let opener = tokio::spawn(h.fsm.open_session());
    h.wait_for_state(Creating).await;

    let SessionHarness { fsm, transport, .. } = h;
    drop(fsm);
    transport.create_gate.open();

    let result = within(opener).await.expect("task");
    assert!(matches!(result, Err(SessionError::Terminated)), "got {result:?}");
}
