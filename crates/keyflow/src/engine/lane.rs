// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-listener outbound lanes.
//!
//! Every listener owns one lane: a FIFO channel drained by a dedicated worker
//! thread that invokes the listener's session. Elements push envelopes while
//! holding their state lock, so a lane carries them in state order (backfill
//! of an attach before any later sample), and a session that stalls only
//! delays its own lane.
//!
//! The worker is spawned on the first push. Dropping the lane closes the
//! channel; the worker drains what is queued and exits.

use crossbeam::channel::{self, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::session::{Envelope, Session};

enum Outbound {
    Deliver(Envelope),
    Flush(Sender<()>),
}

/// Ordered delivery path to one (peer, facet).
pub struct OutboundLane {
    session: Arc<dyn Session>,
    facet: String,
    tx: Option<Sender<Outbound>>,
}

impl OutboundLane {
    pub(crate) fn new(session: Arc<dyn Session>, facet: String) -> Self {
        Self {
            session,
            facet,
            tx: None,
        }
    }

    /// Session the lane invokes.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Facet the lane invokes on the peer.
    pub fn facet(&self) -> &str {
        &self.facet
    }

    /// Queue `envelope` behind everything pushed before. Never blocks.
    pub fn push(&mut self, envelope: Envelope) {
        let kind = envelope.kind();
        let queued = self
            .sender()
            .is_some_and(|tx| tx.send(Outbound::Deliver(envelope)).is_ok());
        if !queued {
            log::warn!(
                "[lane] {} to {} facet '{}' dropped: no worker",
                kind,
                self.session.peer(),
                self.facet
            );
        }
    }

    /// Marker signalled once everything pushed so far was handed to the
    /// session. `None` if nothing was ever pushed.
    pub(crate) fn flush_marker(&self) -> Option<Receiver<()>> {
        let tx = self.tx.as_ref()?;
        let (done_tx, done_rx) = channel::bounded(1);
        tx.send(Outbound::Flush(done_tx)).ok()?;
        Some(done_rx)
    }

    fn sender(&mut self) -> Option<&Sender<Outbound>> {
        if self.tx.is_none() {
            match spawn_worker(Arc::clone(&self.session), self.facet.clone()) {
                Ok(tx) => self.tx = Some(tx),
                Err(e) => {
                    log::warn!("[lane] cannot spawn worker for '{}': {}", self.facet, e);
                    return None;
                }
            }
        }
        self.tx.as_ref()
    }
}

fn spawn_worker(session: Arc<dyn Session>, facet: String) -> std::io::Result<Sender<Outbound>> {
    let (tx, rx) = channel::unbounded::<Outbound>();
    let name = format!("keyflow-out-{}-{}", session.peer().0, facet);

    thread::Builder::new().name(name).spawn(move || {
        for message in rx.iter() {
            match message {
                Outbound::Deliver(envelope) => deliver(session.as_ref(), &facet, envelope),
                Outbound::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        log::debug!("[lane] {} facet '{}' closed", session.peer(), facet);
    })?;
    Ok(tx)
}

fn deliver(session: &dyn Session, facet: &str, envelope: Envelope) {
    let kind = envelope.kind();
    match catch_unwind(AssertUnwindSafe(|| session.invoke(facet, envelope))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!(
            "[lane] {} to {} facet '{}' failed: {}",
            kind,
            session.peer(),
            facet,
            e
        ),
        Err(_) => log::warn!(
            "[lane] {} to {} facet '{}' panicked",
            kind,
            session.peer(),
            facet
        ),
    }
}
