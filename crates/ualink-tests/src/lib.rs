// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ualink Integration Tests
//!
//! Integration tests for the ualink session controller and the state machine
//! runtime it is built on, plus the utilities they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Pre-built configurations and documents
//!   - `mocks`: Scripted transport, manual scheduler, recording collaborators
//!   - `harness`: A controller wired to the mocks
//!   - `assertions`: Custom assertion helpers
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p ualink-tests
//!
//! # Run specific test suite
//! cargo test -p ualink-tests --test integration_session
//! cargo test -p ualink-tests --test integration_keep_alive
//! cargo test -p ualink-tests --test integration_fsm
//! cargo test -p ualink-tests --test integration_config
//!
//! # Run with log output
//! RUST_LOG=ualink=trace cargo test -p ualink-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Session Tests (`integration_session.rs`)
//! - Establishment scenarios and state traces
//! - Coalescing of concurrent callers
//! - Backoff sequence and reset
//! - Close during establishment
//! - Subscription transfer and initializers
//!
//! ### Keep-Alive Tests (`integration_keep_alive.rs`)
//! - Failure threshold and counter reset
//! - Service fault classification
//! - Activity listeners
//!
//! ### FSM Tests (`integration_fsm.rs`)
//! - Engine semantics through a small protocol machine
//!
//! ### Config Tests (`integration_config.rs`)
//! - Loading YAML, TOML and JSON
//! - Environment overrides and placeholders
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use ualink_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let h = SessionHarness::new();
//!     let session = h.open().await;
//!     assert_state(&h.fsm, SessionState::Active);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir, unique_env_prefix};
}
