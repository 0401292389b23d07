// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! State and event predicates used when registering actions.

/// Matches a set of states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFilter<S> {
    /// Matches every state.
    Any,
    /// Matches exactly one state.
    Is(S),
    /// Matches every state except one.
    Not(S),
    /// Matches any of the listed states.
    OneOf(Vec<S>),
}

impl<S: PartialEq> StateFilter<S> {
    /// Returns `true` if `state` satisfies this filter.
    pub fn matches(&self, state: &S) -> bool {
        match self {
            Self::Any => true,
            Self::Is(s) => s == state,
            Self::Not(s) => s != state,
            Self::OneOf(states) => states.contains(state),
        }
    }
}

impl<S> From<S> for StateFilter<S> {
    fn from(state: S) -> Self {
        Self::Is(state)
    }
}

/// Matches a set of event kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter<K> {
    /// Matches every event.
    Any,
    /// Matches one event kind.
    Is(K),
    /// Matches every event kind except one.
    Not(K),
    /// Matches any of the listed event kinds.
    OneOf(Vec<K>),
}

impl<K: PartialEq> EventFilter<K> {
    /// Returns `true` if `kind` satisfies this filter.
    pub fn matches(&self, kind: &K) -> bool {
        match self {
            Self::Any => true,
            Self::Is(k) => k == kind,
            Self::Not(k) => k != kind,
            Self::OneOf(kinds) => kinds.contains(kind),
        }
    }
}

impl<K> From<K> for EventFilter<K> {
    fn from(kind: K) -> Self {
        Self::Is(kind)
    }
}
