// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Session-specific assertion helpers with informative failure messages.

use std::time::Duration;

use ualink_session::{SessionError, SessionFsm, SessionResult, SessionState};

/// Asserts the controller is in `expected`.
pub fn assert_state(fsm: &SessionFsm, expected: SessionState) {
    let actual = fsm.state();
    assert_eq!(
        actual, expected,
        "Expected controller in {expected}, but it is in {actual}"
    );
}

/// Asserts a recorded state trace.
pub fn assert_trace(actual: &[SessionState], expected: &[SessionState]) {
    assert_eq!(
        actual, expected,
        "State trace mismatch:\n  actual:   {actual:?}\n  expected: {expected:?}"
    );
}

/// Asserts the current backoff in whole seconds.
pub fn assert_wait_secs(fsm: &SessionFsm, secs: u64) {
    assert_eq!(
        fsm.wait_time(),
        Some(Duration::from_secs(secs)),
        "Unexpected backoff in state {}",
        fsm.state()
    );
}

/// Asserts a result failed with an error of the given category.
pub fn assert_failed_with<T: std::fmt::Debug>(result: &SessionResult<T>, category: &str) {
    match result {
        Err(e) => assert_eq!(
            e.category(),
            category,
            "Expected a {category} failure, got {e}"
        ),
        Ok(value) => panic!("Expected a {category} failure, got Ok({value:?})"),
    }
}

/// Asserts a result failed with `SessionClosed`.
pub fn assert_closed<T: std::fmt::Debug>(result: &SessionResult<T>) {
    match result {
        Err(SessionError::SessionClosed) => {}
        other => panic!("Expected SessionClosed, got {other:?}"),
    }
}
