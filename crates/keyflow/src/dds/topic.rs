// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Topic
//!
//! A [`Topic`] is a named key space on one node. It owns the arena of its
//! readers and writers, the partial-update updaters, and the reader/writer
//! default configurations.
//!
//! Readers and writers created on the same topic bind to each other
//! automatically through a loopback session: the writer attaches every key
//! (or the key filter) the reader asks for and sends its retained history,
//! the reader registers the writer's keys for arbitration. Elements on other
//! nodes are reached through their facet with a [`Session`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use keyflow::{ElementConfig, Filter, Key, Topic, Result};
//!
//! fn main() -> Result<()> {
//!     let topic = Topic::new("telemetry")?;
//!     topic.set_reader_defaults(ElementConfig::default().sample_count(16))?;
//!
//!     let writer = topic.writer().keys(["engine/1", "engine/2"]).build()?;
//!     let reader = topic.reader().filter(Filter::key_prefix("engine/")).build()?;
//!
//!     writer.add(&Key::from("engine/2"), b"idle".to_vec())?;
//!     assert_eq!(reader.get_next_unread()?.key(), &Key::from("engine/2"));
//!     Ok(())
//! }
//! ```

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::reader::ReaderBuilder;
use super::writer::WriterBuilder;
use crate::core::{Filter, Key};
use crate::engine::{Capability, DataElement, ElementKind, TopicCore};
use crate::error::Result;
use crate::qos::{ElementConfig, ElementRole, TraceLevels};
use crate::session::{AttachRequest, Binding, ForwarderRegistry, LocalSession, PeerId, Session};
use crate::TopicId;

static NEXT_TOPIC_ID: AtomicU64 = AtomicU64::new(1);

/// Builder for a [`Topic`] attached to an explicit node.
pub struct TopicBuilder {
    name: String,
    node: PeerId,
    forwarders: Option<Arc<ForwarderRegistry>>,
    trace: TraceLevels,
}

impl TopicBuilder {
    /// Identity of the node the topic lives on. Defaults to `peer-0`.
    pub fn node(mut self, node: PeerId) -> Self {
        self.node = node;
        self
    }

    /// Forwarder table shared by every topic of the node. A private table
    /// is created when unset.
    pub fn forwarders(mut self, forwarders: Arc<ForwarderRegistry>) -> Self {
        self.forwarders = Some(forwarders);
        self
    }

    pub fn trace(mut self, trace: TraceLevels) -> Self {
        self.trace = trace;
        self
    }

    pub fn build(self) -> Result<Topic> {
        let forwarders = self
            .forwarders
            .unwrap_or_else(|| Arc::new(ForwarderRegistry::new()));
        let id = NEXT_TOPIC_ID.fetch_add(1, Ordering::Relaxed);
        let core = TopicCore::new(&self.name, id, self.node, Arc::clone(&forwarders), self.trace)?;
        let loopback = LocalSession::loopback(self.node, forwarders);
        log::debug!("[{}] topic #{} created on {}", self.name, id, self.node);

        Ok(Topic {
            core,
            loopback,
            reader_defaults: RwLock::new(ElementConfig::default()),
            writer_defaults: RwLock::new(ElementConfig::default()),
        })
    }
}

/// A named key space on one node. Dropping it destroys every element.
pub struct Topic {
    core: Arc<TopicCore>,
    loopback: Arc<LocalSession>,
    reader_defaults: RwLock<ElementConfig>,
    writer_defaults: RwLock<ElementConfig>,
}

impl Topic {
    /// Topic on a standalone node.
    pub fn new(name: &str) -> Result<Self> {
        Self::builder(name).build()
    }

    pub fn builder(name: &str) -> TopicBuilder {
        TopicBuilder {
            name: name.to_string(),
            node: PeerId::default(),
            forwarders: None,
            trace: TraceLevels::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn id(&self) -> TopicId {
        self.core.id()
    }

    pub fn node(&self) -> PeerId {
        self.core.node()
    }

    /// Forwarder table peers reach this topic's elements through.
    pub fn forwarders(&self) -> &Arc<ForwarderRegistry> {
        self.core.forwarders()
    }

    /// Element arena.
    pub fn core(&self) -> &Arc<TopicCore> {
        &self.core
    }

    pub fn reader(&self) -> ReaderBuilder<'_> {
        ReaderBuilder::new(self)
    }

    pub fn writer(&self) -> WriterBuilder<'_> {
        WriterBuilder::new(self)
    }

    // ========================================================================
    // Defaults and updaters
    // ========================================================================

    /// Defaults merged under every new reader's overrides. Rejected if they
    /// do not form a valid reader policy on their own.
    pub fn set_reader_defaults(&self, config: ElementConfig) -> Result<()> {
        config.retention_policy(ElementRole::Reader)?;
        *self.reader_defaults.write() = config;
        Ok(())
    }

    /// Defaults merged under every new writer's overrides.
    pub fn set_writer_defaults(&self, config: ElementConfig) -> Result<()> {
        config.retention_policy(ElementRole::Writer)?;
        *self.writer_defaults.write() = config;
        Ok(())
    }

    pub fn reader_defaults(&self) -> ElementConfig {
        self.reader_defaults.read().clone()
    }

    pub fn writer_defaults(&self) -> ElementConfig {
        self.writer_defaults.read().clone()
    }

    /// Register the function computing a partial update tagged `tag` from
    /// the previous value and the delta. Replaces any previous updater.
    pub fn set_updater<F>(&self, tag: &str, updater: F)
    where
        F: Fn(&[u8], &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.core.set_updater(tag, Arc::new(updater));
    }

    /// Block until every callback submitted so far has run.
    pub fn flush_callbacks(&self) {
        self.core.executor().flush();
    }

    /// Block until every envelope the topic's elements pushed so far was
    /// delivered, then until the callbacks it triggered have run.
    pub fn flush(&self) {
        for element in self.core.elements() {
            element.flush_outbound();
        }
        self.flush_callbacks();
    }

    /// Drop every attachment made over sessions to `peer`. Returns the
    /// number of subscribers released.
    pub fn disconnect_peer(&self, peer: PeerId) -> usize {
        let released: usize = self
            .core
            .elements()
            .iter()
            .map(|element| element.disconnect_peer(peer))
            .sum();
        log::debug!("[{}] {} disconnected, {} subscribers released", self.name(), peer, released);
        released
    }

    // ========================================================================
    // Local binding
    // ========================================================================

    pub(crate) fn create_element(
        &self,
        kind: ElementKind,
        config: ElementConfig,
        sample_filter: Option<Filter>,
    ) -> Result<Arc<DataElement>> {
        let element = self.core.create_element(kind, config, sample_filter)?;

        // The new element is in the arena before the scan, so two concurrent
        // creations bind at least once; a second bind is an idempotent no-op.
        for other in self.core.elements() {
            match (element.role(), other.role()) {
                (ElementRole::Reader, ElementRole::Writer) => self.bind(&other, &element),
                (ElementRole::Writer, ElementRole::Reader) => self.bind(&element, &other),
                _ => {}
            }
        }
        Ok(element)
    }

    fn bind(&self, writer: &DataElement, reader: &DataElement) {
        let shared: Vec<Key> = writer
            .kind()
            .keys()
            .iter()
            .filter(|key| reader.kind().match_key(key))
            .cloned()
            .collect();
        if shared.is_empty() {
            return;
        }
        let session: Arc<dyn Session> = self.loopback.clone();

        // Reader first, so arbitration knows the writer before its backfill arrives.
        let announced = shared
            .iter()
            .map(|key| AttachRequest {
                from: writer.remote(),
                subscriber_id: writer.id(),
                binding: Binding::Key(key.clone()),
                sample_filter: None,
                priority: writer.priority(),
            })
            .collect();
        reader.attach(&session, announced);

        let bindings: Vec<Binding> = match reader.kind() {
            ElementKind::FilteredReader { filter } => vec![Binding::Filter(filter.clone())],
            _ => shared.into_iter().map(Binding::Key).collect(),
        };
        let requested = bindings
            .into_iter()
            .map(|binding| AttachRequest {
                from: reader.remote(),
                subscriber_id: reader.id(),
                binding,
                sample_filter: reader.sample_filter().cloned(),
                priority: reader.priority(),
            })
            .collect();
        writer.attach(&session, requested);
    }
}

impl Drop for Topic {
    fn drop(&mut self) {
        self.core.destroy_all();
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic").field("core", &self.core).finish()
    }
}
