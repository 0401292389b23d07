// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The view an action gets of the machine while it runs.

use std::collections::VecDeque;

use crate::engine::FsmHandle;
use crate::FsmEvent;

/// A callback queued by an action to run once the event has been processed.
pub(crate) type Deferred = Box<dyn FnOnce() + Send>;

/// Everything an action may read or mutate while an event is processed.
///
/// An `ActionContext` only exists inside the actor task, so every mutation it
/// allows is serialized with respect to all other events of the same machine.
///
/// For external transitions `from()` and `to()` are the old and new states.
/// For internal transitions both are the current state.
pub struct ActionContext<'a, S, E: FsmEvent, C> {
    pub(crate) instance_id: u64,
    pub(crate) from: S,
    pub(crate) to: S,
    pub(crate) kind: E::Kind,
    pub(crate) event: &'a mut Option<E>,
    pub(crate) context: &'a mut C,
    pub(crate) shelf: &'a mut VecDeque<E>,
    pub(crate) replay: &'a mut VecDeque<E>,
    pub(crate) deferred: &'a mut Vec<Deferred>,
    pub(crate) handle: &'a FsmHandle<E>,
}

impl<'a, S: Copy, E: FsmEvent, C> ActionContext<'a, S, E, C> {
    /// State the machine was in when the event arrived.
    pub fn from(&self) -> S {
        self.from
    }

    /// State the machine is (or will be) in after the event.
    pub fn to(&self) -> S {
        self.to
    }

    /// Kind of the event being processed.
    ///
    /// Still available after the event itself was taken or shelved.
    pub fn kind(&self) -> E::Kind {
        self.kind
    }

    /// The event being processed, unless an earlier action took or shelved it.
    pub fn event(&self) -> Option<&E> {
        self.event.as_ref()
    }

    /// Mutable access to the event being processed.
    pub fn event_mut(&mut self) -> Option<&mut E> {
        self.event.as_mut()
    }

    /// Takes ownership of the event. Later actions for the same event see `None`.
    pub fn take_event(&mut self) -> Option<E> {
        self.event.take()
    }

    /// The machine's context.
    pub fn context(&self) -> &C {
        self.context
    }

    /// Mutable access to the machine's context.
    pub fn context_mut(&mut self) -> &mut C {
        self.context
    }

    /// Queues a new event on this machine.
    ///
    /// The event is processed after the current one has finished, behind
    /// anything already queued.
    pub fn fire_event(&self, event: E) -> bool {
        self.handle.fire_event(event)
    }

    /// A handle that outlives this action, for completions that fire later.
    pub fn handle(&self) -> FsmHandle<E> {
        self.handle.clone()
    }

    /// Runs `f` after the current event has been processed, once the machine
    /// is unlocked and before the next event starts.
    ///
    /// Callbacks run in the order they were deferred, ahead of transition
    /// listeners. They may query the machine through
    /// [`Fsm::get_from_context`](crate::Fsm::get_from_context).
    pub fn defer(&mut self, f: impl FnOnce() + Send + 'static) {
        self.deferred.push(Box::new(f));
    }

    /// Moves the current event onto the shelf.
    ///
    /// Returns `false` if the event was already taken by an earlier action.
    pub fn shelve_event(&mut self) -> bool {
        match self.event.take() {
            Some(event) => {
                tracing::trace!(
                    instance_id = self.instance_id,
                    event = ?event,
                    shelved = self.shelf.len() + 1,
                    "Shelving event"
                );
                self.shelf.push_back(event);
                true
            }
            None => false,
        }
    }

    /// Schedules every shelved event for redelivery, in the order it was shelved.
    ///
    /// Replayed events run after the current event and before anything still
    /// waiting in the channel.
    pub fn process_shelved_events(&mut self) {
        if !self.shelf.is_empty() {
            tracing::trace!(
                instance_id = self.instance_id,
                count = self.shelf.len(),
                "Replaying shelved events"
            );
        }
        self.replay.extend(self.shelf.drain(..));
    }

    /// Unique id of the machine instance.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Number of events currently on the shelf.
    pub fn shelved_count(&self) -> usize {
        self.shelf.len()
    }
}
