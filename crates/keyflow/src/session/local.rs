// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use super::{Envelope, ForwarderRegistry, PeerId, Session};
use crate::error::{Error, Result};

/// Session delivering calls straight into another node's forwarder table.
///
/// Each session has a reverse half (the session the receiving node uses to
/// reach back); it is handed to handlers as the call origin. A loopback
/// session is its own reverse.
pub struct LocalSession {
    peer: PeerId,
    target: Arc<ForwarderRegistry>,
    reverse: OnceLock<Weak<LocalSession>>,
    connected: Arc<AtomicBool>,
}

impl LocalSession {
    /// Session from a node to itself.
    pub fn loopback(peer: PeerId, registry: Arc<ForwarderRegistry>) -> Arc<LocalSession> {
        Arc::new_cyclic(|me| {
            let reverse = OnceLock::new();
            let _ = reverse.set(me.clone());
            LocalSession {
                peer,
                target: registry,
                reverse,
                connected: Arc::new(AtomicBool::new(true)),
            }
        })
    }

    /// Connect two nodes.
    ///
    /// Returns `(a_to_b, b_to_a)`: the first lives on node `a` and reaches
    /// `b`, the second the other way around.
    pub fn connect(
        a: PeerId,
        a_registry: Arc<ForwarderRegistry>,
        b: PeerId,
        b_registry: Arc<ForwarderRegistry>,
    ) -> (Arc<LocalSession>, Arc<LocalSession>) {
        let connected = Arc::new(AtomicBool::new(true));
        let a_to_b = Arc::new(LocalSession {
            peer: b,
            target: b_registry,
            reverse: OnceLock::new(),
            connected: Arc::clone(&connected),
        });
        let b_to_a = Arc::new(LocalSession {
            peer: a,
            target: a_registry,
            reverse: OnceLock::new(),
            connected,
        });
        let _ = a_to_b.reverse.set(Arc::downgrade(&b_to_a));
        let _ = b_to_a.reverse.set(Arc::downgrade(&a_to_b));
        (a_to_b, b_to_a)
    }

    /// Break the connection in both directions.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            log::debug!("[session] disconnected from {}", self.peer);
        }
    }
}

impl Session for LocalSession {
    fn peer(&self) -> PeerId {
        self.peer
    }

    fn invoke(&self, facet: &str, envelope: Envelope) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::DeliveryFailed(format!(
                "session to {} is disconnected",
                self.peer
            )));
        }

        let origin = self
            .reverse
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::DeliveryFailed(format!("no return path from {}", self.peer)))?;
        let origin: Arc<dyn Session> = origin;

        // Delivery to an unknown facet is not a transport failure.
        self.target.dispatch(&origin, facet, envelope);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSession")
            .field("peer", &self.peer)
            .field("connected", &self.is_connected())
            .finish()
    }
}
