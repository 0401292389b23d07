// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Declarative construction of a machine.

use std::sync::Arc;

use crate::action::ActionContext;
use crate::engine::{Fsm, TransitionListener};
use crate::filter::{EventFilter, StateFilter};
use crate::table::{
    ActionBody, InternalActionRule, Phase, TransitionActionRule, TransitionTable,
};
use crate::{FsmEvent, FsmState};

/// Collects transitions and actions, then spawns the machine.
pub struct FsmBuilder<S, E: FsmEvent, C> {
    name: String,
    table: TransitionTable<S, E, C>,
    listeners: Vec<TransitionListener<S, E::Kind>>,
}

impl<S: FsmState, E: FsmEvent, C: Send + 'static> FsmBuilder<S, E, C> {
    /// Creates an empty builder. `name` only appears in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: TransitionTable::new(),
            listeners: Vec::new(),
        }
    }

    /// Starts an external transition rule out of `state`.
    pub fn when(&mut self, state: S) -> WhenBuilder<'_, S, E, C> {
        WhenBuilder {
            builder: self,
            state,
        }
    }

    /// Starts an entry action for transitions into `state`.
    pub fn on_transition_to(&mut self, state: S) -> TransitionActionBuilder<'_, S, E, C> {
        TransitionActionBuilder {
            builder: self,
            phase: Phase::Entry,
            from: StateFilter::Any,
            to: StateFilter::Is(state),
            via: EventFilter::Any,
        }
    }

    /// Starts an exit action for transitions out of `state`.
    pub fn on_transition_from(&mut self, state: S) -> TransitionActionBuilder<'_, S, E, C> {
        TransitionActionBuilder {
            builder: self,
            phase: Phase::Exit,
            from: StateFilter::Is(state),
            to: StateFilter::Any,
            via: EventFilter::Any,
        }
    }

    /// Starts an action for events handled in `state` without leaving it.
    pub fn on_internal_transition(&mut self, state: S) -> InternalActionBuilder<'_, S, E, C> {
        InternalActionBuilder {
            builder: self,
            state,
            via: EventFilter::Any,
        }
    }

    /// Registers a listener called after every external transition.
    pub fn add_transition_listener<F>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(S, S, E::Kind) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Spawns the machine on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn build(self, initial: S, context: C) -> Fsm<S, E, C> {
        tracing::debug!(
            fsm = %self.name,
            initial = %initial,
            "Building state machine"
        );
        Fsm::spawn(self.name, Arc::new(self.table), self.listeners, initial, context)
    }
}

/// Returned by [`FsmBuilder::when`].
pub struct WhenBuilder<'a, S, E: FsmEvent, C> {
    builder: &'a mut FsmBuilder<S, E, C>,
    state: S,
}

impl<'a, S: FsmState, E: FsmEvent, C: Send + 'static> WhenBuilder<'a, S, E, C> {
    /// The rule applies to one event kind.
    pub fn on(self, kind: E::Kind) -> TransitionBuilder<'a, S, E, C> {
        TransitionBuilder {
            builder: self.builder,
            from: self.state,
            kinds: vec![kind],
        }
    }

    /// The rule applies to each of the given event kinds.
    pub fn on_any(self, kinds: impl IntoIterator<Item = E::Kind>) -> TransitionBuilder<'a, S, E, C> {
        TransitionBuilder {
            builder: self.builder,
            from: self.state,
            kinds: kinds.into_iter().collect(),
        }
    }
}

/// Returned by [`WhenBuilder::on`] and [`WhenBuilder::on_any`].
pub struct TransitionBuilder<'a, S, E: FsmEvent, C> {
    builder: &'a mut FsmBuilder<S, E, C>,
    from: S,
    kinds: Vec<E::Kind>,
}

impl<'a, S: FsmState, E: FsmEvent, C: Send + 'static> TransitionBuilder<'a, S, E, C> {
    /// Completes the rule.
    pub fn transition_to(self, target: S) {
        for kind in self.kinds {
            self.builder.table.add_transition(self.from, kind, target);
        }
    }
}

/// Returned by [`FsmBuilder::on_transition_to`] and [`FsmBuilder::on_transition_from`].
pub struct TransitionActionBuilder<'a, S, E: FsmEvent, C> {
    builder: &'a mut FsmBuilder<S, E, C>,
    phase: Phase,
    from: StateFilter<S>,
    to: StateFilter<S>,
    via: EventFilter<E::Kind>,
}

impl<'a, S: FsmState, E: FsmEvent, C: Send + 'static> TransitionActionBuilder<'a, S, E, C> {
    /// Restricts the source state.
    pub fn from(mut self, filter: impl Into<StateFilter<S>>) -> Self {
        self.from = filter.into();
        self
    }

    /// Restricts the target state.
    pub fn to(mut self, filter: impl Into<StateFilter<S>>) -> Self {
        self.to = filter.into();
        self
    }

    /// Restricts the triggering event kind.
    pub fn via(mut self, filter: impl Into<EventFilter<E::Kind>>) -> Self {
        self.via = filter.into();
        self
    }

    /// Registers `action`.
    pub fn execute<F>(self, action: F)
    where
        F: Fn(&mut ActionContext<'_, S, E, C>) + Send + Sync + 'static,
    {
        self.register(ActionBody::Execute(Arc::new(action)));
    }

    /// Registers the shelf replay. On entry it runs ahead of every other action.
    pub fn replay_shelved_events(self) {
        self.register(ActionBody::ReplayShelved);
    }

    fn register(self, body: ActionBody<S, E, C>) {
        self.builder.table.add_transition_action(TransitionActionRule {
            phase: self.phase,
            from: self.from,
            to: self.to,
            via: self.via,
            body,
        });
    }
}

/// Returned by [`FsmBuilder::on_internal_transition`].
pub struct InternalActionBuilder<'a, S, E: FsmEvent, C> {
    builder: &'a mut FsmBuilder<S, E, C>,
    state: S,
    via: EventFilter<E::Kind>,
}

impl<'a, S: FsmState, E: FsmEvent, C: Send + 'static> InternalActionBuilder<'a, S, E, C> {
    /// Restricts the triggering event kind.
    pub fn via(mut self, filter: impl Into<EventFilter<E::Kind>>) -> Self {
        self.via = filter.into();
        self
    }

    /// Registers `action`.
    pub fn execute<F>(self, action: F)
    where
        F: Fn(&mut ActionContext<'_, S, E, C>) + Send + Sync + 'static,
    {
        self.builder.table.add_internal_action(InternalActionRule {
            state: self.state,
            via: self.via,
            action: Arc::new(action),
        });
    }
}
