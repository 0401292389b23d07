// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared fixtures, mocks and harness for the integration tests.
//!
//! ## Module Structure
//!
//! - `fixtures`: Pre-built configurations and documents
//! - `mocks`: Scripted collaborators and a manual scheduler
//! - `harness`: A controller wired to the mocks, plus polling helpers
//! - `assertions`: Assertion helpers with readable failure messages

pub mod assertions;
pub mod fixtures;
pub mod harness;
pub mod mocks;

// Re-exports for convenience
pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Safe to call from every test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,ualink=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Generate a unique environment variable prefix for test isolation.
pub fn unique_env_prefix(test: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!(
        "UALINK_IT_{}_{}",
        test.to_uppercase(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

/// Create a temporary directory for test data.
pub fn temp_test_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp directory")
}
