// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client session lifecycle controller.
//!
//! This crate keeps one OPC UA session alive for a client: it creates and
//! activates the session, moves existing subscriptions onto it, runs
//! user-supplied initializers, monitors it with keep-alive probes and
//! re-establishes it with exponential backoff when it is lost.
//!
//! Wire encoding and secure channels are out of scope. The controller drives
//! them through the [`SessionTransport`] trait.
//!
//! # Features
//!
//! - Concurrent `open_session` calls share one establishment attempt
//! - `get_session` resolves without a round trip while the session is active
//! - Backoff from `initial_wait` doubling up to `max_wait`
//! - Keep-alive with a configurable failure threshold
//! - Service fault classification for session and secure channel errors
//! - Injectable scheduler for timers, so tests need no wall clock
//!
//! # Error Handling
//!
//! ```text
//! SessionError
//! ├── CreateFailed      - CreateSession round trip failed
//! ├── ActivateFailed    - ActivateSession round trip failed
//! ├── TransferFailed    - TransferSubscriptions failed hard
//! ├── InitializeFailed  - A session initializer failed
//! ├── KeepAliveFailed   - Too many keep-alive probes failed
//! ├── ServiceFault      - Server invalidated the session
//! ├── SessionClosed     - No session and none being established
//! └── Terminated        - The controller was dropped
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ualink_session::{SessionConfig, SessionFsm};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::builder()
//!         .endpoint_url("opc.tcp://localhost:4840")
//!         .build()?;
//!
//!     let fsm = SessionFsm::new(config, Arc::new(MyTransport::default()))?;
//!     let session = fsm.open_session().await?;
//!     println!("Session: {session}");
//!
//!     fsm.close_session().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod fault;
pub mod listener;
pub mod loader;
pub mod scheduler;
pub mod stats;
pub mod status;
pub mod transport;
pub mod types;

mod fsm;

pub use backoff::Backoff;
pub use completion::Completion;
pub use config::{SessionConfig, SessionConfigBuilder};
pub use controller::{SessionFsm, SessionFsmBuilder};
pub use error::{
    ConfigError, ConfigResult, ErrorCode, ErrorSeverity, SessionError, SessionResult, UaError,
    UaResult,
};
pub use fault::{
    is_secure_channel_error, is_session_error, ServiceFaultListener, SessionFaultListener,
    TransferPolicy,
};
pub use fsm::{SessionEventKind, SessionState};
pub use listener::{SessionActivityListener, SessionInitializer};
pub use loader::{load_config, ConfigFormat, ConfigLoader};
pub use scheduler::{Scheduler, TimerHandle, TokioScheduler};
pub use stats::SessionStats;
pub use status::StatusCode;
pub use transport::{NoSubscriptions, SessionTransport, SubscriptionRegistry};
pub use types::{
    ActivateSessionResult, CreateSessionRequest, CreateSessionResult, NodeId, NodeIdentifier,
    ServerState, Session, SubscriptionId,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
