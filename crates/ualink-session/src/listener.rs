// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Hooks that observe or extend session establishment.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::UaResult;
use crate::transport::SessionTransport;
use crate::types::Session;

/// Runs once per successful activation, before the session is handed out.
///
/// All registered initializers run concurrently. Establishment fails if any
/// of them fails.
#[async_trait]
pub trait SessionInitializer: Send + Sync {
    /// Prepares `session`, typically by reading or writing server state.
    async fn initialize(&self, transport: &dyn SessionTransport, session: &Session) -> UaResult<()>;
}

/// Observes a session becoming usable and unusable.
///
/// Callbacks run on the state machine task after the transition, before the
/// next event. They must not block but may query the controller.
pub trait SessionActivityListener: Send + Sync {
    /// Called after the session entered `Active`.
    fn on_session_active(&self, _session: &Session) {}

    /// Called when the session leaves `Active`.
    fn on_session_inactive(&self, _session: &Session) {}
}

/// Copy-on-read list of registered hooks.
pub(crate) struct Registry<T: ?Sized> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, item: Arc<T>) {
        self.items.write().push(item);
    }

    /// Removes `item` by identity. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, item: &Arc<T>) -> bool {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|existing| !Arc::ptr_eq(existing, item));
        items.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl SessionActivityListener for Noop {}

    #[test]
    fn test_registry_add_remove() {
        let registry: Registry<dyn SessionActivityListener> = Registry::new();
        let a: Arc<dyn SessionActivityListener> = Arc::new(Noop);
        let b: Arc<dyn SessionActivityListener> = Arc::new(Noop);

        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&b));
        assert_eq!(registry.len(), 2);

        let snapshot = registry.snapshot();
        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert_eq!(registry.len(), 1);
        assert_eq!(snapshot.len(), 2);
    }
}
