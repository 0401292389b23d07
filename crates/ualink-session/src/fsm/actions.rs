// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Action bodies of the session state machine.
//!
//! Actions run inside the state machine task. Collaborator calls are spawned
//! on the scheduler and report back by firing an event, so the context is
//! only ever touched from here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use rand::RngCore;
use ualink_fsm::ActionContext;

use super::context::SessionContext;
use super::state::{CreatedSession, SessionEvent, SessionState};
use super::Services;
use crate::completion::Completion;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult, UaError, UaResult};
use crate::status::StatusCode;
use crate::types::{CreateSessionRequest, Session};

pub(crate) type Ctx<'a> = ActionContext<'a, SessionState, SessionEvent, SessionContext>;

const CLIENT_NONCE_LEN: usize = 32;

// =============================================================================
// Helpers
// =============================================================================

async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = UaResult<T>>,
) -> UaResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(UaError::timeout(operation, limit)),
    }
}

fn spawn(services: &Services, task: impl Future<Output = ()> + Send + 'static) {
    services.scheduler.spawn(Box::pin(task));
}

fn new_create_request(config: &SessionConfig) -> CreateSessionRequest {
    let mut client_nonce = vec![0u8; CLIENT_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut client_nonce);

    CreateSessionRequest {
        endpoint_url: config.endpoint_url.clone(),
        session_name: config.effective_session_name(),
        application_uri: config.effective_application_uri(),
        client_nonce,
        requested_session_timeout: config.session_timeout,
        max_response_message_size: config.max_response_message_size,
    }
}

/// Answers an `OpenSession` or `GetSession` event with `completion`.
fn reply_session(ctx: &mut Ctx<'_>, completion: Completion<Session>) {
    if let Some(SessionEvent::OpenSession(mut reply) | SessionEvent::GetSession(mut reply)) =
        ctx.take_event()
    {
        reply.send(completion);
    }
}

/// Answers a `CloseSession` event with `completion`.
fn reply_close(ctx: &mut Ctx<'_>, completion: Completion<()>) {
    if let Some(SessionEvent::CloseSession(mut reply)) = ctx.take_event() {
        reply.send(completion);
    }
}

// =============================================================================
// User events
// =============================================================================

/// Hands out the pending or resolved session completion.
pub(crate) fn coalesce_session(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let completion = ctx.context_mut().session_completion();
    reply_session(ctx, completion);
}

pub(crate) fn reject_get_session(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    reply_session(ctx, Completion::resolved(Err(SessionError::SessionClosed)));
}

pub(crate) fn close_when_inactive(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    reply_close(ctx, Completion::resolved(Ok(())));
}

/// Hands out the close completion of the teardown already in progress.
pub(crate) fn coalesce_close(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let completion = ctx.context_mut().close_completion();
    reply_close(ctx, completion);
}

pub(crate) fn shelve(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    ctx.shelve_event();
}

// =============================================================================
// Establishment
// =============================================================================

/// Starts the first attempt for an `OpenSession` arriving in `Inactive`.
pub(crate) fn open_session(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let completion = Completion::new();
    ctx.context_mut().session_completion = Some(completion.clone());
    reply_session(ctx, completion);
    create_session(services, ctx);
}

pub(crate) fn create_session(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let request = new_create_request(&services.config);
    services.stats.record_create_attempt();

    tracing::debug!(
        instance_id = ctx.instance_id(),
        endpoint = %request.endpoint_url,
        session_name = %request.session_name,
        "Creating session"
    );

    let handle = ctx.handle();
    let transport = Arc::clone(&services.transport);
    let limit = services.config.request_timeout;

    spawn(services, async move {
        let created = bounded("CreateSession", limit, transport.create_session(&request)).await;
        let event = match created {
            Ok(result) => {
                SessionEvent::CreateSessionSuccess(Box::new(CreatedSession { request, result }))
            }
            Err(e) => SessionEvent::CreateSessionFailure(SessionError::create_failed(e)),
        };
        handle.fire_event(event);
    });
}

pub(crate) fn activate_session(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::CreateSessionSuccess(created)) = ctx.take_event() else {
        return;
    };
    let CreatedSession { request, result } = *created;

    tracing::debug!(
        instance_id = ctx.instance_id(),
        session_id = %result.session_id,
        "Activating session"
    );

    let handle = ctx.handle();
    let transport = Arc::clone(&services.transport);
    let limit = services.config.request_timeout;

    spawn(services, async move {
        let activated = bounded(
            "ActivateSession",
            limit,
            transport.activate_session(&request, &result),
        )
        .await;
        let event = match activated {
            Ok(activated) => {
                SessionEvent::ActivateSessionSuccess(Session::new(&request, result, activated))
            }
            Err(e) => SessionEvent::ActivateSessionFailure(SessionError::activate_failed(e)),
        };
        handle.fire_event(event);
    });
}

pub(crate) fn transfer_subscriptions(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::ActivateSessionSuccess(session)) = ctx.take_event() else {
        return;
    };
    services.stats.record_activation();

    let handle = ctx.handle();
    let task_services = Arc::clone(services);

    spawn(services, async move {
        let event = match transfer(&task_services, &session).await {
            Ok(()) => SessionEvent::TransferSubscriptionsSuccess(session),
            Err(e) => SessionEvent::TransferSubscriptionsFailure(e),
        };
        handle.fire_event(event);
    });
}

async fn transfer(services: &Services, session: &Session) -> SessionResult<()> {
    let ids = services.subscriptions.subscription_ids();
    if ids.is_empty() {
        return Ok(());
    }

    tracing::debug!(session = %session, count = ids.len(), "Transferring subscriptions");

    let limit = services.config.request_timeout;
    let outcome = bounded(
        "TransferSubscriptions",
        limit,
        services.transport.transfer_subscriptions(session, &ids),
    )
    .await;

    match outcome {
        Ok(results) => {
            for (index, id) in ids.iter().enumerate() {
                let status = results
                    .get(index)
                    .copied()
                    .unwrap_or(StatusCode::Bad_UnexpectedError);
                if !status.is_good() {
                    tracing::warn!(subscription = %id, status = %status, "Subscription transfer failed");
                    services.subscriptions.transfer_failed(*id, status);
                }
            }
            Ok(())
        }
        Err(e) if services.transfer_policy.is_unsupported(e.status()) => {
            tracing::debug!(
                status = %e.status(),
                count = ids.len(),
                "Server does not support subscription transfer, dropping subscriptions"
            );
            for id in ids {
                services.subscriptions.transfer_failed(id, e.status());
            }
            Ok(())
        }
        Err(e) => Err(SessionError::transfer_failed(e)),
    }
}

pub(crate) fn initialize_session(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::TransferSubscriptionsSuccess(session)) = ctx.take_event() else {
        return;
    };

    let handle = ctx.handle();
    let task_services = Arc::clone(services);

    spawn(services, async move {
        let event = match run_initializers(&task_services, &session).await {
            Ok(()) => SessionEvent::InitializeSuccess(session),
            Err(e) => SessionEvent::InitializeFailure(SessionError::initialize_failed(e)),
        };
        handle.fire_event(event);
    });
}

async fn run_initializers(services: &Services, session: &Session) -> UaResult<()> {
    let initializers = services.initializers.snapshot();
    if initializers.is_empty() {
        return Ok(());
    }

    tracing::debug!(session = %session, count = initializers.len(), "Running session initializers");

    let transport = services.transport.as_ref();
    let all = future::try_join_all(
        initializers
            .iter()
            .map(|initializer| initializer.initialize(transport, session)),
    );
    bounded("Initialize", services.config.request_timeout, async move {
        all.await.map(|_| ())
    })
    .await
}

/// Publishes the session and starts keep-alive monitoring.
///
/// Activity listeners are notified once the machine is unlocked.
pub(crate) fn session_active(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::InitializeSuccess(session)) = ctx.take_event() else {
        return;
    };

    let handle = ctx.handle();
    let tick_session = session.clone();
    let keep_alive_timer = services.scheduler.schedule_repeating(
        services.config.keep_alive_interval,
        Box::new(move || {
            handle.fire_event(SessionEvent::KeepAlive(tick_session.clone()));
        }),
    );

    let completion = {
        let context = ctx.context_mut();
        context.wait_time = None;
        context.keep_alive_failures = 0;
        if let Some(previous) = context.keep_alive_timer.replace(keep_alive_timer) {
            previous.cancel();
        }
        context.session = Some(session.clone());
        context.session_completion()
    };
    *services.active.write() = Some(session.clone());
    completion.succeed(session.clone());

    tracing::info!(
        instance_id = ctx.instance_id(),
        session_id = %session.session_id(),
        session_name = session.session_name(),
        timeout = ?session.session_timeout(),
        "Session active"
    );

    let listeners = services.listeners.snapshot();
    ctx.defer(move || {
        for listener in listeners {
            listener.on_session_active(&session);
        }
    });
}

/// Fails every caller waiting on the attempt that just failed.
///
/// Runs before the `CreatingWait` entry action replaces the completion.
pub(crate) fn establishment_failed(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(error) = ctx.take_event().and_then(SessionEvent::into_establish_error) else {
        return;
    };

    services.stats.record_failure();
    error.log("session establishment");

    if let Some(completion) = ctx.context_mut().session_completion.take() {
        completion.fail(error);
    }
}

// =============================================================================
// Backoff
// =============================================================================

pub(crate) fn schedule_reconnect(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let handle = ctx.handle();
    let context = ctx.context_mut();

    let wait = services.backoff.next(context.wait_time);
    context.wait_time = Some(wait);
    context.session_completion = Some(Completion::new());

    let timer = services.scheduler.schedule_once(
        wait,
        Box::new(move || {
            handle.fire_event(SessionEvent::CreatingWaitExpired);
        }),
    );
    if let Some(previous) = context.wait_timer.replace(timer) {
        previous.cancel();
    }

    tracing::info!(instance_id = ctx.instance_id(), wait = ?wait, "Reconnecting after backoff");
}

pub(crate) fn cancel_reconnect(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    if let Some(timer) = ctx.context_mut().wait_timer.take() {
        timer.cancel();
    }
}

/// Gives up reconnecting because a caller closed the session.
pub(crate) fn abandon_reconnect(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let context = ctx.context_mut();
    context.wait_time = None;
    if let Some(completion) = context.session_completion.take() {
        completion.fail(SessionError::SessionClosed);
    }

    reply_close(ctx, Completion::resolved(Ok(())));
    tracing::info!(instance_id = ctx.instance_id(), "Reconnect abandoned, session closed");
}

// =============================================================================
// Keep-alive
// =============================================================================

pub(crate) fn keep_alive(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::KeepAlive(session)) = ctx.take_event() else {
        return;
    };
    if !ctx.context().is_current(&session) {
        return;
    }

    let handle = ctx.handle();
    let transport = Arc::clone(&services.transport);
    let limit = services.config.keep_alive_timeout;

    spawn(services, async move {
        let probe = bounded("Read ServerState", limit, transport.read_server_state(&session)).await;
        let event = match probe {
            Ok(state) => {
                if !state.is_running() {
                    tracing::debug!(session = %session, server_state = %state, "Server is not running");
                }
                SessionEvent::KeepAliveProbeSuccess(session)
            }
            Err(e) => SessionEvent::KeepAliveProbeFailure(session, e),
        };
        handle.fire_event(event);
    });
}

pub(crate) fn keep_alive_succeeded(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::KeepAliveProbeSuccess(session)) = ctx.take_event() else {
        return;
    };
    let context = ctx.context_mut();
    if context.is_current(&session) {
        context.keep_alive_failures = 0;
    }
}

pub(crate) fn keep_alive_failed(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let Some(SessionEvent::KeepAliveProbeFailure(session, error)) = ctx.take_event() else {
        return;
    };
    let context = ctx.context_mut();
    if !context.is_current(&session) {
        return;
    }

    context.keep_alive_failures += 1;
    let failures = context.keep_alive_failures;
    let allowed = services.config.keep_alive_failures_allowed;
    services.stats.record_keep_alive_failure();

    tracing::warn!(
        instance_id = ctx.instance_id(),
        session = %session,
        failures,
        allowed,
        error = %error,
        "Keep-alive failed"
    );

    if failures > allowed {
        ctx.fire_event(SessionEvent::KeepAliveFailure);
    }
}

// =============================================================================
// Leaving Active
// =============================================================================

/// Stops keep-alive monitoring and notifies activity listeners.
pub(crate) fn session_inactive(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let session = {
        let context = ctx.context_mut();
        if let Some(timer) = context.keep_alive_timer.take() {
            timer.cancel();
        }
        context.session_completion = None;
        context.session.clone()
    };
    services.active.write().take();

    if let Some(session) = session {
        let listeners = services.listeners.snapshot();
        ctx.defer(move || {
            for listener in listeners {
                listener.on_session_inactive(&session);
            }
        });
    }
}

/// Drops the lost session before reconnecting.
pub(crate) fn session_lost(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let reason = match ctx.event() {
        Some(SessionEvent::ServiceFault(status)) => SessionError::ServiceFault { status: *status },
        _ => SessionError::KeepAliveFailed {
            failures: ctx.context().keep_alive_failures,
        },
    };
    reason.log("session lost");

    services.stats.record_reconnection();
    ctx.context_mut().session = None;
}

// =============================================================================
// Close
// =============================================================================

pub(crate) fn close_session(services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    let completion = Completion::new();
    let session = {
        let context = ctx.context_mut();
        context.close_completion = Some(completion.clone());
        context.session.take()
    };
    reply_close(ctx, completion);
    services.stats.record_close();

    let Some(session) = session else {
        ctx.fire_event(SessionEvent::CloseSessionSuccess);
        return;
    };

    tracing::debug!(instance_id = ctx.instance_id(), session = %session, "Closing session");

    let handle = ctx.handle();
    let transport = Arc::clone(&services.transport);
    let limit = services.config.request_timeout;

    spawn(services, async move {
        if let Err(e) = bounded("CloseSession", limit, transport.close_session(&session)).await {
            tracing::warn!(session = %session, error = %e, "CloseSession failed, discarding session");
        }
        handle.fire_event(SessionEvent::CloseSessionSuccess);
    });
}

pub(crate) fn session_closed(_services: &Arc<Services>, ctx: &mut Ctx<'_>) {
    if let Some(completion) = ctx.context_mut().close_completion.take() {
        completion.succeed(());
    }
    tracing::info!(instance_id = ctx.instance_id(), "Session closed");
}
