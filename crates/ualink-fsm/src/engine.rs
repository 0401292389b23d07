// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The actor task and the handles used to talk to it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::{ActionContext, Deferred};
use crate::table::{ActionBody, TransitionTable};
use crate::{FsmEvent, FsmState};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Called with `(from, to, kind)` after every external transition.
pub type TransitionListener<S, K> = Arc<dyn Fn(S, S, K) + Send + Sync>;

// =============================================================================
// FsmHandle
// =============================================================================

/// A cheap sender that can fire events into a machine.
///
/// Unlike [`Fsm`], holding a handle does not keep the machine alive.
pub struct FsmHandle<E> {
    tx: mpsc::UnboundedSender<E>,
    instance_id: u64,
}

impl<E> Clone for FsmHandle<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            instance_id: self.instance_id,
        }
    }
}

impl<E: FsmEvent> FsmHandle<E> {
    /// Queues `event`. Returns `false` if the machine has stopped.
    pub fn fire_event(&self, event: E) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::trace!(
                    instance_id = self.instance_id,
                    event = ?event,
                    "Dropping event for stopped state machine"
                );
                false
            }
        }
    }

    /// Unique id of the machine instance.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Returns `true` once the actor task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<E> fmt::Debug for FsmHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmHandle")
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

// =============================================================================
// Core
// =============================================================================

struct FsmCore<S, E: FsmEvent, C> {
    state: S,
    context: C,
    shelf: VecDeque<E>,
    table: Arc<TransitionTable<S, E, C>>,
}

impl<S: FsmState, E: FsmEvent, C> FsmCore<S, E, C> {
    /// Runs one event to completion.
    ///
    /// Returns the transition taken, if any. Events replayed from the shelf
    /// are appended to `replay`, deferred callbacks to `deferred`.
    fn process(
        &mut self,
        name: &str,
        event: E,
        replay: &mut VecDeque<E>,
        deferred: &mut Vec<Deferred>,
        handle: &FsmHandle<E>,
    ) -> Option<(S, S, E::Kind)> {
        let instance_id = handle.instance_id;
        let kind = event.kind();
        let from = self.state;
        let table = Arc::clone(&self.table);

        tracing::trace!(
            fsm = %name,
            instance_id,
            state = %from,
            event = ?event,
            "Processing event"
        );

        let mut event = Some(event);

        match table.target(from, kind) {
            Some(to) => {
                for rule in table.exit_actions(from, to, kind) {
                    self.run(&rule.body, from, to, kind, &mut event, replay, deferred, handle);
                }

                self.state = to;
                tracing::debug!(
                    fsm = %name,
                    instance_id,
                    from = %from,
                    to = %to,
                    event = ?kind,
                    "State transition"
                );

                for rule in table.entry_actions(from, to, kind) {
                    self.run(&rule.body, from, to, kind, &mut event, replay, deferred, handle);
                }

                Some((from, to, kind))
            }
            None => {
                let mut handled = false;
                for action in table.internal_actions(from, kind) {
                    handled = true;
                    let mut ctx = ActionContext {
                        instance_id,
                        from,
                        to: from,
                        kind,
                        event: &mut event,
                        context: &mut self.context,
                        shelf: &mut self.shelf,
                        replay: &mut *replay,
                        deferred: &mut *deferred,
                        handle,
                    };
                    action(&mut ctx);
                }

                if !handled {
                    tracing::trace!(
                        fsm = %name,
                        instance_id,
                        state = %from,
                        event = ?kind,
                        "Event not applicable in current state"
                    );
                }
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        body: &ActionBody<S, E, C>,
        from: S,
        to: S,
        kind: E::Kind,
        event: &mut Option<E>,
        replay: &mut VecDeque<E>,
        deferred: &mut Vec<Deferred>,
        handle: &FsmHandle<E>,
    ) {
        let mut ctx = ActionContext {
            instance_id: handle.instance_id,
            from,
            to,
            kind,
            event,
            context: &mut self.context,
            shelf: &mut self.shelf,
            replay,
            deferred,
            handle,
        };

        match body {
            ActionBody::ReplayShelved => ctx.process_shelved_events(),
            ActionBody::Execute(action) => action(&mut ctx),
        }
    }
}

// =============================================================================
// Fsm
// =============================================================================

struct FsmShared<S, E: FsmEvent, C> {
    name: Arc<str>,
    core: Arc<Mutex<FsmCore<S, E, C>>>,
    current: Arc<RwLock<S>>,
    listeners: Arc<RwLock<Vec<TransitionListener<S, E::Kind>>>>,
    handle: FsmHandle<E>,
    task: JoinHandle<()>,
}

impl<S, E: FsmEvent, C> Drop for FsmShared<S, E, C> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A running state machine.
///
/// Clones share the same instance. The actor task stops when the last clone
/// is dropped.
pub struct Fsm<S, E: FsmEvent, C> {
    shared: Arc<FsmShared<S, E, C>>,
}

impl<S, E: FsmEvent, C> Clone for Fsm<S, E, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: FsmState, E: FsmEvent, C: Send + 'static> Fsm<S, E, C> {
    pub(crate) fn spawn(
        name: String,
        table: Arc<TransitionTable<S, E, C>>,
        listeners: Vec<TransitionListener<S, E::Kind>>,
        initial: S,
        context: C,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = FsmHandle {
            tx,
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
        };

        let name: Arc<str> = Arc::from(name);
        let core = Arc::new(Mutex::new(FsmCore {
            state: initial,
            context,
            shelf: VecDeque::new(),
            table,
        }));
        let current = Arc::new(RwLock::new(initial));
        let listeners = Arc::new(RwLock::new(listeners));

        let task = tokio::spawn(run_loop(
            Arc::clone(&name),
            Arc::clone(&core),
            Arc::clone(&current),
            Arc::clone(&listeners),
            handle.clone(),
            rx,
        ));

        Self {
            shared: Arc::new(FsmShared {
                name,
                core,
                current,
                listeners,
                handle,
                task,
            }),
        }
    }

    /// Queues `event` and returns immediately.
    pub fn fire_event(&self, event: E) -> bool {
        self.shared.handle.fire_event(event)
    }

    /// Runs `f` against the current state and context, serialized with event
    /// processing.
    ///
    /// Must not be called from inside an action or the calling thread deadlocks.
    /// Callbacks registered with [`ActionContext::defer`] and transition
    /// listeners run unlocked and may call it.
    pub fn get_from_context<R>(&self, f: impl FnOnce(S, &mut C) -> R) -> R {
        let mut core = self.shared.core.lock();
        let core = &mut *core;
        f(core.state, &mut core.context)
    }

    /// The current state. Safe to call from actions and listeners.
    pub fn state(&self) -> S {
        *self.shared.current.read()
    }

    /// Unique id of this machine instance.
    pub fn instance_id(&self) -> u64 {
        self.shared.handle.instance_id
    }

    /// Name given to the builder.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// A handle that fires events without keeping the machine alive.
    pub fn handle(&self) -> FsmHandle<E> {
        self.shared.handle.clone()
    }

    /// Registers a listener called after every external transition.
    pub fn add_transition_listener(&self, listener: TransitionListener<S, E::Kind>) {
        self.shared.listeners.write().push(listener);
    }
}

impl<S: FsmState, E: FsmEvent, C> fmt::Debug for Fsm<S, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm")
            .field("name", &self.shared.name)
            .field("instance_id", &self.shared.handle.instance_id)
            .field("state", &*self.shared.current.read())
            .finish()
    }
}

async fn run_loop<S: FsmState, E: FsmEvent, C>(
    name: Arc<str>,
    core: Arc<Mutex<FsmCore<S, E, C>>>,
    current: Arc<RwLock<S>>,
    listeners: Arc<RwLock<Vec<TransitionListener<S, E::Kind>>>>,
    handle: FsmHandle<E>,
    mut rx: mpsc::UnboundedReceiver<E>,
) {
    let mut pending = VecDeque::new();
    let mut deferred = Vec::new();

    while let Some(event) = rx.recv().await {
        pending.push_back(event);

        while let Some(event) = pending.pop_front() {
            let transition = {
                let mut core = core.lock();
                let transition = core.process(&name, event, &mut pending, &mut deferred, &handle);
                *current.write() = core.state;
                transition
            };

            for callback in deferred.drain(..) {
                callback();
            }

            if let Some((from, to, kind)) = transition {
                let snapshot = listeners.read().clone();
                for listener in snapshot {
                    listener(from, to, kind);
                }
            }
        }
    }

    tracing::trace!(fsm = %name, instance_id = handle.instance_id, "State machine stopped");
}
