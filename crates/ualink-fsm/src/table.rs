// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transition table and registered action rules.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::ActionContext;
use crate::filter::{EventFilter, StateFilter};
use crate::{FsmEvent, FsmState};

/// A transition or internal action body.
pub(crate) type Action<S, E, C> = Arc<dyn Fn(&mut ActionContext<'_, S, E, C>) + Send + Sync>;

/// When a transition action runs relative to the state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Before the current state changes.
    Exit,
    /// After the current state changed.
    Entry,
}

pub(crate) enum ActionBody<S, E: FsmEvent, C> {
    /// Re-deliver every shelved event.
    ReplayShelved,
    /// Run a registered closure.
    Execute(Action<S, E, C>),
}

pub(crate) struct TransitionActionRule<S, E: FsmEvent, C> {
    pub(crate) phase: Phase,
    pub(crate) from: StateFilter<S>,
    pub(crate) to: StateFilter<S>,
    pub(crate) via: EventFilter<E::Kind>,
    pub(crate) body: ActionBody<S, E, C>,
}

impl<S: FsmState, E: FsmEvent, C> TransitionActionRule<S, E, C> {
    fn matches(&self, phase: Phase, from: &S, to: &S, kind: &E::Kind) -> bool {
        self.phase == phase && self.from.matches(from) && self.to.matches(to) && self.via.matches(kind)
    }
}

pub(crate) struct InternalActionRule<S, E: FsmEvent, C> {
    pub(crate) state: S,
    pub(crate) via: EventFilter<E::Kind>,
    pub(crate) action: Action<S, E, C>,
}

/// Immutable, shared description of a machine.
pub(crate) struct TransitionTable<S, E: FsmEvent, C> {
    transitions: HashMap<(S, E::Kind), S>,
    transition_actions: Vec<TransitionActionRule<S, E, C>>,
    internal_actions: Vec<InternalActionRule<S, E, C>>,
}

impl<S: FsmState, E: FsmEvent, C> TransitionTable<S, E, C> {
    pub(crate) fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            transition_actions: Vec::new(),
            internal_actions: Vec::new(),
        }
    }

    pub(crate) fn add_transition(&mut self, from: S, kind: E::Kind, to: S) {
        if let Some(previous) = self.transitions.insert((from, kind), to) {
            tracing::trace!(
                from = %from,
                event = ?kind,
                previous = %previous,
                to = %to,
                "Replacing registered transition"
            );
        }
    }

    pub(crate) fn add_transition_action(&mut self, rule: TransitionActionRule<S, E, C>) {
        self.transition_actions.push(rule);
    }

    pub(crate) fn add_internal_action(&mut self, rule: InternalActionRule<S, E, C>) {
        self.internal_actions.push(rule);
    }

    /// Returns the target state for `(from, kind)`, if an external transition exists.
    pub(crate) fn target(&self, from: S, kind: E::Kind) -> Option<S> {
        self.transitions.get(&(from, kind)).copied()
    }

    pub(crate) fn exit_actions<'a>(
        &'a self,
        from: S,
        to: S,
        kind: E::Kind,
    ) -> impl Iterator<Item = &'a TransitionActionRule<S, E, C>> + 'a {
        self.transition_actions
            .iter()
            .filter(move |r| r.matches(Phase::Exit, &from, &to, &kind))
    }

    /// Entry actions with every replay action ordered first.
    pub(crate) fn entry_actions(
        &self,
        from: S,
        to: S,
        kind: E::Kind,
    ) -> Vec<&TransitionActionRule<S, E, C>> {
        let (mut replay, execute): (Vec<_>, Vec<_>) = self
            .transition_actions
            .iter()
            .filter(|r| r.matches(Phase::Entry, &from, &to, &kind))
            .partition(|r| matches!(r.body, ActionBody::ReplayShelved));

        replay.extend(execute);
        replay
    }

    pub(crate) fn internal_actions<'a>(
        &'a self,
        state: S,
        kind: E::Kind,
    ) -> impl Iterator<Item = &'a Action<S, E, C>> + 'a {
        self.internal_actions
            .iter()
            .filter(move |r| r.state == state && r.via.matches(&kind))
            .map(|r| &r.action)
    }
}
