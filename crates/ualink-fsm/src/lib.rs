// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ualink-fsm
//!
//! A small, domain-agnostic finite state machine runtime.
//!
//! Every machine is an actor: events are queued on an unbounded channel and
//! processed one at a time by a dedicated tokio task. Each event runs to
//! completion (exit actions, state mutation, entry actions) before the next
//! one is dequeued.
//!
//! ## Concepts
//!
//! - **State** (`S`): a closed, `Copy` enumeration.
//! - **Event** (`E`): a tagged union implementing [`FsmEvent`], whose
//!   [`FsmEvent::Kind`] is the key used by the transition table.
//! - **Context** (`C`): a strongly typed struct owned by the machine. Only
//!   actions (and [`Fsm::get_from_context`]) may touch it.
//! - **Shelf**: events an action decided to defer. They are replayed, in
//!   order, ahead of anything still queued once a replay action runs.
//! - **Deferred callbacks**: closures an action hands to
//!   [`ActionContext::defer`]. They run after the event, with the machine
//!   unlocked, so they may call back into it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  fire_event   ┌──────────────────┐
//! │ Fsm / Handle │ ────────────▶ │  mpsc (unbounded)│
//! └──────────────┘               └────────┬─────────┘
//!                                         ▼
//!                       ┌──────────────────────────────────┐
//!                       │ actor task                       │
//!                       │  lookup (state, kind)            │
//!                       │   ├─ external: exit → set → entry│
//!                       │   └─ internal: actions in order  │
//!                       │  unlock, run deferred, listeners │
//!                       │  drain replayed shelf            │
//!                       └──────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ualink_fsm::{FsmBuilder, FsmEvent};
//!
//! let mut fb = FsmBuilder::<Light, Switch, Counter>::new("light");
//! fb.when(Light::Off).on(SwitchKind::Flip).transition_to(Light::On);
//! fb.when(Light::On).on(SwitchKind::Flip).transition_to(Light::Off);
//! fb.on_transition_to(Light::On).execute(|ctx| ctx.context_mut().flips += 1);
//!
//! let fsm = fb.build(Light::Off, Counter::default());
//! fsm.fire_event(Switch::Flip);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

mod action;
mod builder;
mod engine;
mod filter;
mod table;

pub use action::ActionContext;
pub use builder::{
    FsmBuilder, InternalActionBuilder, TransitionActionBuilder, TransitionBuilder, WhenBuilder,
};
pub use engine::{Fsm, FsmHandle, TransitionListener};
pub use filter::{EventFilter, StateFilter};

use std::fmt;
use std::hash::Hash;

/// Marker trait for state enumerations.
///
/// Blanket-implemented for every type meeting the bounds.
pub trait FsmState: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> FsmState for T where T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// An event that can be fed to a state machine.
pub trait FsmEvent: fmt::Debug + Send + 'static {
    /// The payload-free discriminant used as the transition table key.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the discriminant of this event.
    fn kind(&self) -> Self::Kind;
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
