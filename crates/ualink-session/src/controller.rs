// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The public face of a session state machine.
//!
//! [`SessionFsm`] turns calls into events and hands back futures. Every future
//! is `'static` and may be awaited anywhere. The active session is published
//! outside the machine, so reading it never waits for an event in progress.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::oneshot;

use crate::completion::{Completion, Reply};
use crate::config::SessionConfig;
use crate::error::{ConfigResult, SessionError, SessionResult};
use crate::fault::{SessionFaultListener, TransferPolicy};
use crate::fsm::{self, SessionEvent, SessionEventKind, SessionMachine, SessionState, Services};
use crate::listener::{Registry, SessionActivityListener, SessionInitializer};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::stats::SessionStats;
use crate::transport::{NoSubscriptions, SessionTransport, SubscriptionRegistry};
use crate::types::Session;

// =============================================================================
// SessionFsmBuilder
// =============================================================================

/// Builder for [`SessionFsm`].
pub struct SessionFsmBuilder {
    config: SessionConfig,
    transport: Arc<dyn SessionTransport>,
    subscriptions: Option<Arc<dyn SubscriptionRegistry>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    transfer_policy: TransferPolicy,
}

impl SessionFsmBuilder {
    /// Starts a builder for a controller talking through `transport`.
    pub fn new(config: SessionConfig, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            config,
            transport,
            subscriptions: None,
            scheduler: None,
            transfer_policy: TransferPolicy::default(),
        }
    }

    /// Sets the registry whose subscriptions follow the session.
    pub fn subscriptions(mut self, subscriptions: Arc<dyn SubscriptionRegistry>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    /// Sets the scheduler used for timers and collaborator calls.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets which transfer failures mean "transfer not supported".
    pub fn transfer_policy(mut self, policy: TransferPolicy) -> Self {
        self.transfer_policy = policy;
        self
    }

    /// Validates the configuration and spawns the state machine.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime.
    pub fn build(self) -> ConfigResult<SessionFsm> {
        self.config.validate()?;

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::current()));
        let subscriptions = self
            .subscriptions
            .unwrap_or_else(|| Arc::new(NoSubscriptions));
        let backoff = self.config.backoff();

        let services = Arc::new(Services {
            config: self.config,
            transport: self.transport,
            subscriptions,
            scheduler,
            transfer_policy: self.transfer_policy,
            initializers: Registry::new(),
            listeners: Registry::new(),
            stats: SessionStats::new(),
            backoff,
            active: RwLock::new(None),
        });

        let machine = fsm::spawn_session_machine(&services);

        tracing::debug!(
            instance_id = machine.instance_id(),
            endpoint = %services.config.endpoint_url,
            "Session controller created"
        );

        Ok(SessionFsm { machine, services })
    }
}

impl fmt::Debug for SessionFsmBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFsmBuilder")
            .field("config", &self.config)
            .field("transfer_policy", &self.transfer_policy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// SessionFsm
// =============================================================================

/// Owns one session to one endpoint and keeps it alive.
///
/// Clones share the same state machine. It stops when the last clone is
/// dropped; callers still waiting then observe [`SessionError::Terminated`].
///
/// # Example
///
/// ```rust,ignore
/// let fsm = SessionFsm::builder(config, transport).build()?;
/// let session = fsm.open_session().await?;
/// // ...
/// fsm.close_session().await?;
/// ```
#[derive(Clone)]
pub struct SessionFsm {
    machine: SessionMachine,
    services: Arc<Services>,
}

impl SessionFsm {
    /// Starts a builder.
    pub fn builder(config: SessionConfig, transport: Arc<dyn SessionTransport>) -> SessionFsmBuilder {
        SessionFsmBuilder::new(config, transport)
    }

    /// Builds a controller with default collaborators.
    pub fn new(config: SessionConfig, transport: Arc<dyn SessionTransport>) -> ConfigResult<Self> {
        SessionFsmBuilder::new(config, transport).build()
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Returns the session, establishing one if needed.
    ///
    /// Concurrent callers during establishment share one attempt and observe
    /// the same result.
    pub fn open_session(&self) -> impl Future<Output = SessionResult<Session>> + Send + 'static {
        let (reply, rx) = Reply::channel();
        let fired = self.machine.fire_event(SessionEvent::OpenSession(reply));
        await_reply(fired, rx)
    }

    /// Closes the session.
    ///
    /// Resolves immediately if there is none. During establishment the close
    /// is deferred until the attempt has settled.
    pub fn close_session(&self) -> impl Future<Output = SessionResult<()>> + Send + 'static {
        let (reply, rx) = Reply::channel();
        let fired = self.machine.fire_event(SessionEvent::CloseSession(reply));
        await_reply(fired, rx)
    }

    /// Returns the current or pending session without starting one.
    ///
    /// Resolves on first poll while active. Fails with
    /// [`SessionError::SessionClosed`] while inactive.
    pub fn get_session(&self) -> impl Future<Output = SessionResult<Session>> + Send + 'static {
        let active = self.try_get_session();
        let pending = match active {
            Some(_) => None,
            None => {
                let (reply, rx) = Reply::channel();
                let fired = self.machine.fire_event(SessionEvent::GetSession(reply));
                Some(await_reply(fired, rx))
            }
        };

        async move {
            match (active, pending) {
                (Some(session), _) => Ok(session),
                (None, Some(pending)) => pending.await,
                (None, None) => Err(SessionError::Terminated),
            }
        }
    }

    /// The session if it is active right now.
    pub fn try_get_session(&self) -> Option<Session> {
        self.services.active.read().clone()
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Registers a hook run after every activation.
    pub fn add_initializer(&self, initializer: Arc<dyn SessionInitializer>) {
        self.services.initializers.add(initializer);
    }

    /// Unregisters a hook. Returns `false` if it was not registered.
    pub fn remove_initializer(&self, initializer: &Arc<dyn SessionInitializer>) -> bool {
        self.services.initializers.remove(initializer)
    }

    /// Registers a listener for the session becoming active or inactive.
    pub fn add_activity_listener(&self, listener: Arc<dyn SessionActivityListener>) {
        self.services.listeners.add(listener);
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_activity_listener(&self, listener: &Arc<dyn SessionActivityListener>) -> bool {
        self.services.listeners.remove(listener)
    }

    /// Registers a callback invoked with `(from, to, event)` after every state change.
    pub fn add_transition_listener<F>(&self, listener: F)
    where
        F: Fn(SessionState, SessionState, SessionEventKind) + Send + Sync + 'static,
    {
        self.machine.add_transition_listener(Arc::new(listener));
    }

    /// A listener the transport calls with every observed service fault.
    pub fn fault_listener(&self) -> SessionFaultListener {
        SessionFaultListener::new(self.machine.handle())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// The current reconnect backoff, if reconnecting.
    pub fn wait_time(&self) -> Option<Duration> {
        self.machine.get_from_context(|_, context| context.wait_time)
    }

    /// Consecutive keep-alive failures of the current session.
    pub fn keep_alive_failure_count(&self) -> u64 {
        self.machine
            .get_from_context(|_, context| context.keep_alive_failures)
    }

    /// Lifetime counters.
    pub fn stats(&self) -> &SessionStats {
        &self.services.stats
    }

    /// The configuration this controller runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.services.config
    }

    /// Unique id of the underlying state machine.
    pub fn instance_id(&self) -> u64 {
        self.machine.instance_id()
    }
}

impl fmt::Debug for SessionFsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFsm")
            .field("instance_id", &self.machine.instance_id())
            .field("endpoint", &self.services.config.endpoint_url)
            .field("state", &self.machine.state())
            .finish()
    }
}

/// Waits for the completion sent back by the state machine, then for its result.
fn await_reply<T>(
    fired: bool,
    rx: oneshot::Receiver<Completion<T>>,
) -> impl Future<Output = SessionResult<T>> + Send + 'static
where
    T: Clone + Send + Sync + 'static,
{
    async move {
        if !fired {
            return Err(SessionError::Terminated);
        }
        let completion = rx.await.map_err(|_| SessionError::Terminated)?;
        // The state machine holds the only writer; let it go if the machine dies.
        let result = completion.wait();
        drop(completion);
        result.await
    }
}
