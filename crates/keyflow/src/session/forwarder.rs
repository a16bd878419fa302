// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Facet dispatch table.

use dashmap::DashMap;
use std::sync::{Arc, Weak};

use super::{Envelope, Session};

/// Receiver of peer calls addressed to a facet.
pub trait ForwardHandler: Send + Sync {
    /// Apply `envelope`, received over `origin`.
    fn forward(&self, origin: &Arc<dyn Session>, envelope: Envelope);
}

/// Per-node table of facet handlers.
///
/// Handlers are held weakly: a handler whose owner is gone behaves like an
/// unregistered facet. Calls for unknown facets are dropped and logged.
#[derive(Default)]
pub struct ForwarderRegistry {
    handlers: DashMap<String, Weak<dyn ForwardHandler>>,
}

impl ForwarderRegistry {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route calls for `facet` to `handler`, replacing any previous handler.
    pub fn register(&self, facet: &str, handler: Weak<dyn ForwardHandler>) {
        log::debug!("[forwarder] register facet '{}'", facet);
        self.handlers.insert(facet.to_string(), handler);
    }

    /// Stop routing calls for `facet`.
    pub fn unregister(&self, facet: &str) {
        if self.handlers.remove(facet).is_some() {
            log::debug!("[forwarder] unregister facet '{}'", facet);
        }
    }

    /// Whether a live handler is registered for `facet`.
    pub fn contains(&self, facet: &str) -> bool {
        self.handlers
            .get(facet)
            .is_some_and(|h| h.strong_count() > 0)
    }

    /// Number of registered facets.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no facet is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route `envelope` to the handler of `facet`.
    ///
    /// Returns `false` if the call was dropped.
    pub fn dispatch(&self, origin: &Arc<dyn Session>, facet: &str, envelope: Envelope) -> bool {
        // Clone out of the map so the shard lock is not held during the call.
        let handler = self.handlers.get(facet).map(|h| h.value().clone());

        match handler.and_then(|h| h.upgrade()) {
            Some(handler) => {
                handler.forward(origin, envelope);
                true
            }
            None => {
                log::debug!(
                    "[forwarder] dropped {} from {} for unknown facet '{}'",
                    envelope.kind(),
                    origin.peer(),
                    facet
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for ForwarderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwarderRegistry")
            .field("facets", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Key;
    use crate::session::{LocalSession, PeerId, RemoteElement};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(PeerId, &'static str)>>,
    }

    impl ForwardHandler for Recorder {
        fn forward(&self, origin: &Arc<dyn Session>, envelope: Envelope) {
            self.seen.lock().push((origin.peer(), envelope.kind()));
        }
    }

    fn detach() -> Envelope {
        Envelope::DetachKey {
            from: RemoteElement {
                topic: 1,
                element: 2,
            },
            key: Key::from("k"),
        }
    }

    #[test]
    fn routes_to_registered_facet() {
        let registry = Arc::new(ForwarderRegistry::new());
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn ForwardHandler> = Arc::downgrade(&recorder) as Weak<dyn ForwardHandler>;
        registry.register("1.1", weak);

        let origin: Arc<dyn Session> = LocalSession::loopback(PeerId(4), Arc::clone(&registry));
        assert!(registry.dispatch(&origin, "1.1", detach()));
        assert!(!registry.dispatch(&origin, "1.9", detach()));

        assert_eq!(*recorder.seen.lock(), vec![(PeerId(4), "detach-key")]);
    }

    #[test]
    fn dropped_handler_is_a_silent_no_op() {
        let registry = Arc::new(ForwarderRegistry::new());
        let recorder = Arc::new(Recorder::default());
        registry.register("1.1", Arc::downgrade(&recorder) as Weak<dyn ForwardHandler>);
        drop(recorder);

        let origin: Arc<dyn Session> = LocalSession::loopback(PeerId(1), Arc::clone(&registry));
        assert!(!registry.contains("1.1"));
        assert!(!registry.dispatch(&origin, "1.1", detach()));
    }
}
