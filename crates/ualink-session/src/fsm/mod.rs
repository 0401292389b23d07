// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The session lifecycle state machine.
//!
//! ```text
//!            OpenSession                 CreateSessionSuccess
//! Inactive ─────────────▶ Creating ──────────────────────────▶ Activating
//!    ▲                       ▲                                     │
//!    │ CloseSession          │ CreatingWaitExpired                 │ ActivateSessionSuccess
//!    │                       │                                     ▼
//!    ├──────────────── CreatingWait ◀──── any failure ───── Transferring
//!    │                       ▲                                     │
//!    │                       │ KeepAliveFailure / ServiceFault     │ TransferSubscriptionsSuccess
//!    │ CloseSessionSuccess   │                                     ▼
//! Closing ◀──────────────  Active ◀──────────────────────── Initializing
//!           CloseSession              InitializeSuccess
//! ```

mod actions;
mod context;
mod state;

use std::sync::Arc;

use parking_lot::RwLock;
use ualink_fsm::{EventFilter, Fsm, FsmBuilder, StateFilter};

use self::actions::Ctx;
use crate::backoff::Backoff;
use crate::config::SessionConfig;
use crate::fault::TransferPolicy;
use crate::listener::{Registry, SessionActivityListener, SessionInitializer};
use crate::scheduler::Scheduler;
use crate::stats::SessionStats;
use crate::transport::{SessionTransport, SubscriptionRegistry};
use crate::types::Session;

pub(crate) use self::context::SessionContext;
pub(crate) use self::state::SessionEvent;
pub use self::state::{SessionEventKind, SessionState};

pub(crate) type SessionMachine = Fsm<SessionState, SessionEvent, SessionContext>;

/// Collaborators and settings shared by every action of one controller.
pub(crate) struct Services {
    pub(crate) config: SessionConfig,
    pub(crate) transport: Arc<dyn SessionTransport>,
    pub(crate) subscriptions: Arc<dyn SubscriptionRegistry>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) transfer_policy: TransferPolicy,
    pub(crate) initializers: Registry<dyn SessionInitializer>,
    pub(crate) listeners: Registry<dyn SessionActivityListener>,
    pub(crate) stats: SessionStats,
    pub(crate) backoff: Backoff,
    /// The session while the machine is `Active`, readable without the machine lock.
    pub(crate) active: RwLock<Option<Session>>,
}

type ActionFn = fn(&Arc<Services>, &mut Ctx<'_>);

fn bind(services: &Arc<Services>, action: ActionFn) -> impl Fn(&mut Ctx<'_>) + Send + Sync + 'static {
    let services = Arc::clone(services);
    move |ctx: &mut Ctx<'_>| action(&services, ctx)
}

/// Wires the transition table and spawns the machine in `Inactive`.
pub(crate) fn spawn_session_machine(services: &Arc<Services>) -> SessionMachine {
    use self::SessionEventKind as K;
    use self::SessionState::*;

    let mut fb = FsmBuilder::new("session");

    configure_inactive(&mut fb, services);
    configure_creating_wait(&mut fb, services);
    configure_establishing(&mut fb, services);
    configure_active(&mut fb, services);
    configure_closing(&mut fb, services);

    // Establishment failures all share the same way back.
    for state in [Creating, Activating, Transferring, Initializing] {
        fb.when(state).on_any(K::ESTABLISH_FAILURES).transition_to(CreatingWait);
    }

    fb.build(Inactive, SessionContext::default())
}

type Builder = FsmBuilder<SessionState, SessionEvent, SessionContext>;

fn configure_inactive(fb: &mut Builder, services: &Arc<Services>) {
    use self::SessionEventKind as K;
    use self::SessionState::*;

    fb.when(Inactive).on(K::OpenSession).transition_to(Creating);

    fb.on_transition_to(Inactive).replay_shelved_events();

    fb.on_internal_transition(Inactive)
        .via(K::GetSession)
        .execute(bind(services, actions::reject_get_session));

    fb.on_internal_transition(Inactive)
        .via(K::CloseSession)
        .execute(bind(services, actions::close_when_inactive));
}

fn configure_creating_wait(fb: &mut Builder, services: &Arc<Services>) {
    use self::SessionEventKind as K;
    use self::SessionState::*;

    fb.when(CreatingWait).on(K::CreatingWaitExpired).transition_to(Creating);
    fb.when(CreatingWait).on(K::CloseSession).transition_to(Inactive);

    fb.on_transition_to(CreatingWait).replay_shelved_events();

    // Must run before the completion is replaced below.
    fb.on_transition_to(CreatingWait)
        .from(StateFilter::OneOf(SessionState::IN_FLIGHT.to_vec()))
        .via(EventFilter::OneOf(K::ESTABLISH_FAILURES.to_vec()))
        .execute(bind(services, actions::establishment_failed));

    fb.on_transition_to(CreatingWait)
        .execute(bind(services, actions::schedule_reconnect));

    fb.on_transition_from(CreatingWait)
        .execute(bind(services, actions::cancel_reconnect));

    fb.on_transition_from(CreatingWait)
        .to(Inactive)
        .via(K::CloseSession)
        .execute(bind(services, actions::abandon_reconnect));

    fb.on_internal_transition(CreatingWait)
        .via(EventFilter::OneOf(vec![K::OpenSession, K::GetSession]))
        .execute(bind(services, actions::coalesce_session));
}

fn configure_establishing(fb: &mut Builder, services: &Arc<Services>) {
    use self::SessionEventKind as K;
    use self::SessionState::*;

    fb.when(Creating).on(K::CreateSessionSuccess).transition_to(Activating);
    fb.when(Activating).on(K::ActivateSessionSuccess).transition_to(Transferring);
    fb.when(Transferring).on(K::TransferSubscriptionsSuccess).transition_to(Initializing);
    fb.when(Initializing).on(K::InitializeSuccess).transition_to(Active);

    fb.on_transition_to(Creating)
        .from(Inactive)
        .via(K::OpenSession)
        .execute(bind(services, actions::open_session));

    fb.on_transition_to(Creating)
        .from(CreatingWait)
        .via(K::CreatingWaitExpired)
        .execute(bind(services, actions::create_session));

    fb.on_transition_to(Activating)
        .via(K::CreateSessionSuccess)
        .execute(bind(services, actions::activate_session));

    fb.on_transition_to(Transferring)
        .via(K::ActivateSessionSuccess)
        .execute(bind(services, actions::transfer_subscriptions));

    fb.on_transition_to(Initializing)
        .via(K::TransferSubscriptionsSuccess)
        .execute(bind(services, actions::initialize_session));

    for state in SessionState::IN_FLIGHT {
        fb.on_internal_transition(state)
            .via(EventFilter::OneOf(vec![K::OpenSession, K::GetSession]))
            .execute(bind(services, actions::coalesce_session));

        // Teardown waits until establishment reaches a replay point.
        fb.on_internal_transition(state)
            .via(K::CloseSession)
            .execute(bind(services, actions::shelve));
    }
}

fn configure_active(fb: &mut Builder, services: &Arc<Services>) {
    use self::SessionEventKind as K;
    use self::SessionState::*;

    fb.when(Active).on(K::CloseSession).transition_to(Closing);
    fb.when(Active)
        .on_any([K::KeepAliveFailure, K::ServiceFault])
        .transition_to(CreatingWait);

    fb.on_transition_to(Active).replay_shelved_events();

    fb.on_transition_to(Active)
        .from(Initializing)
        .via(K::InitializeSuccess)
        .execute(bind(services, actions::session_active));

    fb.on_transition_from(Active)
        .execute(bind(services, actions::session_inactive));

    fb.on_transition_from(Active)
        .to(CreatingWait)
        .execute(bind(services, actions::session_lost));

    fb.on_internal_transition(Active)
        .via(EventFilter::OneOf(vec![K::OpenSession, K::GetSession]))
        .execute(bind(services, actions::coalesce_session));

    fb.on_internal_transition(Active)
        .via(K::KeepAlive)
        .execute(bind(services, actions::keep_alive));

    fb.on_internal_transition(Active)
        .via(K::KeepAliveProbeSuccess)
        .execute(bind(services, actions::keep_alive_succeeded));

    fb.on_internal_transition(Active)
        .via(K::KeepAliveProbeFailure)
        .execute(bind(services, actions::keep_alive_failed));
}

fn configure_closing(fb: &mut Builder, services: &Arc<Services>) {
    use self::SessionEventKind as K;
    use self::SessionState::*;

    fb.when(Closing).on(K::CloseSessionSuccess).transition_to(Inactive);

    fb.on_transition_to(Closing)
        .from(Active)
        .via(K::CloseSession)
        .execute(bind(services, actions::close_session));

    fb.on_transition_from(Closing)
        .to(Inactive)
        .execute(bind(services, actions::session_closed));

    fb.on_internal_transition(Closing)
        .via(K::CloseSession)
        .execute(bind(services, actions::coalesce_close));

    fb.on_internal_transition(Closing)
        .via(EventFilter::Not(K::CloseSession))
        .execute(bind(services, actions::shelve));
}
