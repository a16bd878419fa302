// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic element arena.
//!
//! The arena owns every live element of a topic and the services they
//! share: element id allocation, partial-update updaters, the callback
//! executor and the node's forwarder table. Elements only keep a weak
//! reference back to it.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::element::{DataElement, ElementKind};
use super::executor::CallbackExecutor;
use crate::core::{Filter, FilterTarget};
use crate::error::{Error, Result};
use crate::qos::{ElementConfig, TraceLevels};
use crate::session::{ForwardHandler, ForwarderRegistry, PeerId};
use crate::{ElementId, TopicId};

/// Computes a new value from the previous value and an encoded delta.
pub type Updater = Arc<dyn Fn(&[u8], &[u8]) -> Vec<u8> + Send + Sync>;

/// Shared state of one topic on one node.
pub struct TopicCore {
    name: String,
    id: TopicId,
    node: PeerId,
    trace: TraceLevels,
    next_element_id: AtomicU64,
    elements: RwLock<BTreeMap<ElementId, Arc<DataElement>>>,
    updaters: RwLock<HashMap<String, Updater>>,
    forwarders: Arc<ForwarderRegistry>,
    executor: Arc<CallbackExecutor>,
}

impl TopicCore {
    /// Create the arena and its callback executor.
    pub fn new(
        name: &str,
        id: TopicId,
        node: PeerId,
        forwarders: Arc<ForwarderRegistry>,
        trace: TraceLevels,
    ) -> Result<Arc<Self>> {
        trace.validate()?;
        let executor = Arc::new(CallbackExecutor::new(name)?);
        Ok(Arc::new(Self {
            name: name.to_string(),
            id,
            node,
            trace,
            next_element_id: AtomicU64::new(1),
            elements: RwLock::new(BTreeMap::new()),
            updaters: RwLock::new(HashMap::new()),
            forwarders,
            executor,
        }))
    }

    /// Topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic id on this node.
    pub fn id(&self) -> TopicId {
        self.id
    }

    /// This node.
    pub fn node(&self) -> PeerId {
        self.node
    }

    /// Trace levels handed to new elements.
    pub fn trace(&self) -> TraceLevels {
        self.trace
    }

    /// Callback executor shared by the topic's elements.
    pub fn executor(&self) -> &Arc<CallbackExecutor> {
        &self.executor
    }

    /// Forwarder table of this node.
    pub fn forwarders(&self) -> &Arc<ForwarderRegistry> {
        &self.forwarders
    }

    /// Validate `config`, build the element, register its facet and add it
    /// to the arena.
    pub fn create_element(
        self: &Arc<Self>,
        kind: ElementKind,
        config: ElementConfig,
        sample_filter: Option<Filter>,
    ) -> Result<Arc<DataElement>> {
        let policy = config.retention_policy(kind.role())?;

        if let Some(filter) = &sample_filter {
            if filter.target() != FilterTarget::Sample {
                return Err(Error::InvalidConfig(format!(
                    "sample filter '{}' is a key filter",
                    filter.name()
                )));
            }
        }
        if let ElementKind::FilteredReader { filter } = &kind {
            if filter.target() != FilterTarget::Key {
                return Err(Error::InvalidConfig(format!(
                    "reader filter '{}' is a sample filter",
                    filter.name()
                )));
            }
        }

        let id = self.next_element_id.fetch_add(1, Ordering::Relaxed);
        let element = Arc::new(DataElement::new(id, kind, config, policy, sample_filter, self));

        let handler: Weak<dyn ForwardHandler> = Arc::downgrade(&element) as Weak<dyn ForwardHandler>;
        self.forwarders.register(&element.facet(), handler);
        self.elements.write().insert(id, Arc::clone(&element));

        element.trace_topic(1, format_args!("created with {:?}", element.retention_policy()));
        Ok(element)
    }

    /// Live element by id.
    pub fn element(&self, id: ElementId) -> Option<Arc<DataElement>> {
        self.elements.read().get(&id).cloned()
    }

    /// Every live element, in id order.
    pub fn elements(&self) -> Vec<Arc<DataElement>> {
        self.elements.read().values().cloned().collect()
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// Whether no element is live.
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    pub(crate) fn remove(&self, id: ElementId) {
        self.elements.write().remove(&id);
    }

    /// Register the updater used for partial updates tagged `tag`.
    pub fn set_updater(&self, tag: &str, updater: Updater) {
        self.updaters.write().insert(tag.to_string(), updater);
    }

    /// Updater registered under `tag`.
    pub fn updater(&self, tag: &str) -> Option<Updater> {
        self.updaters.read().get(tag).cloned()
    }

    /// Destroy every element.
    pub fn destroy_all(&self) {
        // Collected first: destroy() re-enters the arena to remove itself.
        for element in self.elements() {
            element.destroy();
        }
    }
}

impl std::fmt::Debug for TopicCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicCore")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("node", &self.node)
            .field("elements", &self.len())
            .finish()
    }
}
