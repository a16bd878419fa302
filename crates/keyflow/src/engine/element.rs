// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data element core shared by readers and writers.
//!
//! # Locking
//!
//! - `state` guards everything mutable (registry, ranking, queues, history).
//!   Peer calls and local calls serialize through it.
//! - Outgoing envelopes are pushed on the listener's
//!   [`OutboundLane`](super::lane::OutboundLane) while `state` is held, so
//!   backfill sent on attach always precedes samples published after it.
//!   Sessions are only invoked from lane workers, never under a lock.
//! - Hooks are submitted to the executor while `state` is held (submission
//!   order = state order) and run on the executor thread, never under a lock.
//!
//! An element never takes another element's `state` while holding its own.

use arc_swap::ArcSwapOption;
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};

use super::arena::TopicCore;
use super::executor::CallbackExecutor;
use super::registry::{ListenerKey, Registry, Subscriber};
use crate::core::{Filter, Key, Sample, WriterId};
use crate::dds::reader::ReaderState;
use crate::dds::writer::WriterState;
use crate::error::{Error, Result};
use crate::qos::{ElementConfig, ElementRole, PriorityRanking, RetentionPolicy, TraceLevels};
use crate::session::{
    AttachRequest, Binding, Envelope, ForwardHandler, ForwarderRegistry, PeerId, RemoteElement,
    Session,
};
use crate::ElementId;

/// What an element can serve.
pub trait Capability {
    /// Whether the element produces or consumes `key`.
    fn match_key(&self, key: &Key) -> bool;
    /// Whether the element can be attached through `filter`.
    fn match_filter(&self, filter: &Filter) -> bool;
}

/// The element variants sharing the engine.
#[derive(Debug, Clone)]
pub enum ElementKind {
    /// Reader of a fixed key set.
    KeyReader {
        /// Keys read.
        keys: Vec<Key>,
    },
    /// Reader of every key a key filter accepts.
    FilteredReader {
        /// Key filter.
        filter: Filter,
    },
    /// Writer of a fixed key set.
    KeyWriter {
        /// Keys written.
        keys: Vec<Key>,
    },
}

impl ElementKind {
    /// Reader or writer.
    pub fn role(&self) -> ElementRole {
        match self {
            ElementKind::KeyReader { .. } | ElementKind::FilteredReader { .. } => ElementRole::Reader,
            ElementKind::KeyWriter { .. } => ElementRole::Writer,
        }
    }

    /// Fixed key set, if any.
    pub fn keys(&self) -> &[Key] {
        match self {
            ElementKind::KeyReader { keys } | ElementKind::KeyWriter { keys } => keys,
            ElementKind::FilteredReader { .. } => &[],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ElementKind::KeyReader { .. } => "reader",
            ElementKind::FilteredReader { .. } => "filtered-reader",
            ElementKind::KeyWriter { .. } => "writer",
        }
    }
}

impl Capability for ElementKind {
    fn match_key(&self, key: &Key) -> bool {
        match self {
            ElementKind::KeyReader { keys } | ElementKind::KeyWriter { keys } => keys.contains(key),
            ElementKind::FilteredReader { filter } => filter.match_key(key),
        }
    }

    fn match_filter(&self, filter: &Filter) -> bool {
        match self {
            ElementKind::KeyReader { keys } | ElementKind::KeyWriter { keys } => {
                keys.iter().any(|k| filter.match_key(k))
            }
            ElementKind::FilteredReader { filter: own } => own == filter,
        }
    }
}

/// Remote side of a connection, as reported to hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Remote peer.
    pub peer: PeerId,
    /// Remote element.
    pub remote: RemoteElement,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.peer, self.remote)
    }
}

/// Acknowledgement of one newly attached binding.
#[derive(Debug, Clone)]
pub struct AttachAck {
    /// Attached binding.
    pub binding: Binding,
    /// Backfill delivered for it (always empty on readers).
    pub samples: Vec<Sample>,
}

pub(crate) type KeyHook = Box<dyn Fn(Connection, &Key) + Send + Sync>;
pub(crate) type FilterHook = Box<dyn Fn(Connection, &Filter) + Send + Sync>;
pub(crate) type SampleHook = Box<dyn Fn(&Sample) + Send + Sync>;
pub(crate) type InitHook = Box<dyn Fn(&[Sample]) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) key_connect: ArcSwapOption<KeyHook>,
    pub(crate) key_disconnect: ArcSwapOption<KeyHook>,
    pub(crate) filter_connect: ArcSwapOption<FilterHook>,
    pub(crate) filter_disconnect: ArcSwapOption<FilterHook>,
    pub(crate) sample: ArcSwapOption<SampleHook>,
    pub(crate) init: ArcSwapOption<InitHook>,
}

pub(crate) struct ElementState {
    pub(crate) destroyed: bool,
    pub(crate) registry: Registry,
    pub(crate) ranking: PriorityRanking,
    pub(crate) reader: ReaderState,
    pub(crate) writer: WriterState,
}

/// One reader or writer.
///
/// Owned by its topic's arena; user handles ([`DataReader`](crate::DataReader),
/// [`DataWriter`](crate::DataWriter)) destroy it on drop.
pub struct DataElement {
    pub(crate) id: ElementId,
    pub(crate) kind: ElementKind,
    pub(crate) label: String,
    pub(crate) origin: WriterId,
    pub(crate) config: ElementConfig,
    pub(crate) policy: RetentionPolicy,
    pub(crate) sample_filter: Option<Filter>,
    pub(crate) trace: TraceLevels,
    pub(crate) topic: Weak<TopicCore>,
    pub(crate) executor: Arc<CallbackExecutor>,
    pub(crate) forwarders: Arc<ForwarderRegistry>,
    pub(crate) state: Mutex<ElementState>,
    pub(crate) changed: Condvar,
    pub(crate) hooks: Hooks,
}

impl DataElement {
    pub(crate) fn new(
        id: ElementId,
        kind: ElementKind,
        config: ElementConfig,
        policy: RetentionPolicy,
        sample_filter: Option<Filter>,
        topic: &Arc<TopicCore>,
    ) -> Self {
        let origin = WriterId {
            peer: topic.node(),
            topic: topic.id(),
            element: id,
        };
        Self {
            id,
            label: format!("{}:{}#{}", topic.name(), kind.label(), id),
            kind,
            origin,
            config,
            policy,
            sample_filter,
            trace: topic.trace(),
            topic: Arc::downgrade(topic),
            executor: Arc::clone(topic.executor()),
            forwarders: Arc::clone(topic.forwarders()),
            state: Mutex::new(ElementState {
                destroyed: false,
                registry: Registry::new(),
                ranking: PriorityRanking::new(),
                reader: ReaderState::default(),
                writer: WriterState::default(),
            }),
            changed: Condvar::new(),
            hooks: Hooks::default(),
        }
    }

    // ========================================================================
    // Identity and configuration
    // ========================================================================

    /// Element id within its topic.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Element variant.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Reader or writer.
    pub fn role(&self) -> ElementRole {
        self.kind.role()
    }

    /// This element as peers see it.
    pub fn remote(&self) -> RemoteElement {
        RemoteElement {
            topic: self.origin.topic,
            element: self.id,
        }
    }

    /// Facet this element is registered under.
    pub fn facet(&self) -> String {
        self.remote().facet()
    }

    /// Identity stamped on samples this element produces.
    pub fn writer_id(&self) -> WriterId {
        self.origin
    }

    /// Effective configuration (element overrides merged over topic defaults).
    pub fn config(&self) -> &ElementConfig {
        &self.config
    }

    /// Validated retention policy.
    pub fn retention_policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Priority announced to readers.
    pub fn priority(&self) -> i32 {
        self.config.priority.unwrap_or(0)
    }

    /// Content filter requested from writers (readers only).
    pub fn sample_filter(&self) -> Option<&Filter> {
        self.sample_filter.as_ref()
    }

    /// Whether [`destroy`](Self::destroy) ran.
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    // ========================================================================
    // Attach / detach protocol
    // ========================================================================

    /// Attach one key. Returns `true` if the key was not attached yet.
    pub fn attach_key(&self, session: &Arc<dyn Session>, request: AttachRequest) -> bool {
        if !matches!(request.binding, Binding::Key(_)) {
            log::debug!("[{}] attach_key called with {}", self.label, request.binding);
            return false;
        }
        !self.attach(session, vec![request]).is_empty()
    }

    /// Attach one key filter. Returns the filter if it was not attached yet.
    pub fn attach_filter(&self, session: &Arc<dyn Session>, request: AttachRequest) -> Option<Filter> {
        let Binding::Filter(filter) = request.binding.clone() else {
            log::debug!("[{}] attach_filter called with {}", self.label, request.binding);
            return None;
        };
        if self.attach(session, vec![request]).is_empty() {
            None
        } else {
            Some(filter)
        }
    }

    /// Attach several bindings received over `session`.
    ///
    /// Returns one ack per newly attached binding. On a writer the backfill
    /// in each ack has already been sent to the requester, ahead of any
    /// sample published after this call.
    pub fn attach(&self, session: &Arc<dyn Session>, requests: Vec<AttachRequest>) -> Vec<AttachAck> {
        let mut state = self.state.lock();
        if state.destroyed {
            log::debug!("[{}] attach from {} ignored: destroyed", self.label, session.peer());
            return Vec::new();
        }

        let now = SystemTime::now();
        let mut acks = Vec::new();
        for request in &requests {
            if let Some(samples) = self.attach_one(&mut state, session, request, now) {
                if !samples.is_empty() {
                    let listener = ListenerKey {
                        peer: session.peer(),
                        facet: request.from.facet(),
                    };
                    let envelope = Envelope::InitSamples {
                        from: self.remote(),
                        samples: samples.clone(),
                    };
                    state.registry.push(&listener, envelope);
                }
                acks.push(AttachAck {
                    binding: request.binding.clone(),
                    samples,
                });
            }
        }

        if !acks.is_empty() {
            self.changed.notify_all();
        }
        acks
    }

    fn attach_one(
        &self,
        state: &mut ElementState,
        session: &Arc<dyn Session>,
        request: &AttachRequest,
        now: SystemTime,
    ) -> Option<Vec<Sample>> {
        let conn = Connection {
            peer: session.peer(),
            remote: request.from,
        };

        let servable = match &request.binding {
            Binding::Key(key) => self.kind.match_key(key),
            Binding::Filter(filter) => self.kind.match_filter(filter),
        };
        if !servable {
            log::debug!("[{}] refused {} from {}", self.label, request.binding, conn);
            return None;
        }

        if !state.registry.attach(session, request) {
            self.trace_session(2, format_args!("{} from {} already attached", request.binding, conn));
            return None;
        }
        self.trace_session(1, format_args!("attached {} from {}", request.binding, conn));

        let backfill = match self.role() {
            ElementRole::Reader => {
                if let Binding::Key(key) = &request.binding {
                    let writer = conn.writer_id();
                    if state.ranking.insert(key, writer, request.priority) {
                        self.trace_session(
                            2,
                            format_args!("{} now top writer of {}", state.ranking.top(key).unwrap_or(writer), key),
                        );
                    }
                }
                Vec::new()
            }
            ElementRole::Writer => state.writer.backfill(
                &request.binding,
                request.sample_filter.as_ref(),
                0,
                &self.policy,
                now,
            ),
        };

        self.notify_binding(conn, &request.binding, true);
        Some(backfill)
    }

    /// Detach one key. Returns `false` if it was not attached.
    pub fn detach_key(&self, peer: PeerId, from: &RemoteElement, key: &Key) -> bool {
        self.detach_binding(peer, from, &Binding::Key(key.clone()))
    }

    /// Detach one key filter. Returns `false` if it was not attached.
    pub fn detach_filter(&self, peer: PeerId, from: &RemoteElement, filter: &Filter) -> bool {
        self.detach_binding(peer, from, &Binding::Filter(filter.clone()))
    }

    fn detach_binding(&self, peer: PeerId, from: &RemoteElement, binding: &Binding) -> bool {
        let mut state = self.state.lock();
        if state.destroyed {
            return false;
        }

        let conn = Connection {
            peer,
            remote: *from,
        };
        if !state.registry.detach(peer, from, binding).was_present() {
            self.trace_session(2, format_args!("{} from {} not attached", binding, conn));
            return false;
        }
        self.trace_session(1, format_args!("detached {} from {}", binding, conn));

        if let (ElementRole::Reader, Binding::Key(key)) = (self.role(), binding) {
            let writer = conn.writer_id();
            state.ranking.remove(key, writer);
            state.reader.forget_instance(writer, key);
        }

        self.notify_binding(conn, binding, false);
        self.changed.notify_all();
        true
    }

    /// Drop every binding of a destroyed remote element.
    pub fn detach_element(&self, peer: PeerId, from: &RemoteElement) -> bool {
        let mut state = self.state.lock();
        if state.destroyed {
            return false;
        }
        match state.registry.detach_element(peer, from) {
            Some(subscriber) => {
                self.release_subscriber(&mut state, peer, &subscriber);
                self.changed.notify_all();
                true
            }
            None => false,
        }
    }

    /// Drop every listener of `peer` (session lost). Returns the number of
    /// removed subscribers.
    pub fn disconnect_peer(&self, peer: PeerId) -> usize {
        let mut state = self.state.lock();
        if state.destroyed {
            return 0;
        }
        let removed = state.registry.disconnect_peer(peer);
        for subscriber in &removed {
            self.release_subscriber(&mut state, peer, subscriber);
        }
        if !removed.is_empty() {
            self.trace_session(1, format_args!("{} disconnected, {} subscribers dropped", peer, removed.len()));
            self.changed.notify_all();
        }
        removed.len()
    }

    fn release_subscriber(&self, state: &mut ElementState, peer: PeerId, subscriber: &Subscriber) {
        let conn = Connection {
            peer,
            remote: subscriber.remote,
        };
        self.trace_session(1, format_args!("released {}", conn));

        if self.role() == ElementRole::Reader {
            let writer = conn.writer_id();
            state.ranking.remove_writer(writer);
            state.reader.forget_writer(writer);
        }
        for binding in &subscriber.bindings {
            self.notify_binding(conn, binding, false);
        }
    }

    // ========================================================================
    // Registry queries and waiters
    // ========================================================================

    /// Number of (peer, facet) listeners.
    pub fn listener_count(&self) -> usize {
        self.state.lock().registry.listener_count()
    }

    /// Number of distinct peers attached.
    pub fn peer_count(&self) -> usize {
        self.state.lock().registry.peer_count()
    }

    /// Keys attached by remote elements.
    pub fn connected_keys(&self) -> BTreeSet<Key> {
        self.state.lock().registry.connected_keys()
    }

    /// Filters attached by remote elements.
    pub fn connected_filters(&self) -> BTreeSet<Filter> {
        self.state.lock().registry.connected_filters()
    }

    /// Whether at least one listener is attached.
    pub fn has_listeners(&self) -> bool {
        !self.state.lock().registry.is_empty()
    }

    /// Block until listeners on at least `count` distinct peers are attached.
    pub fn wait_for_listeners(&self, count: usize, timeout: Option<Duration>) -> Result<()> {
        self.wait_until(timeout, |state| {
            (state.registry.peer_count() >= count).then_some(())
        })
    }

    /// Block until `ready` yields a value, the element is destroyed
    /// (`ElementDestroyed`) or `timeout` elapses (`Timeout`).
    pub(crate) fn wait_until<T>(
        &self,
        timeout: Option<Duration>,
        mut ready: impl FnMut(&mut ElementState) -> Option<T>,
    ) -> Result<T> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if state.destroyed {
                return Err(Error::ElementDestroyed);
            }
            if let Some(value) = ready(&mut state) {
                return Ok(value);
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        if state.destroyed {
                            return Err(Error::ElementDestroyed);
                        }
                        return ready(&mut state).ok_or(Error::Timeout);
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Called when a remote element attaches a key.
    pub fn on_key_connect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Key) + Send + Sync + 'static,
    {
        let hook: KeyHook = Box::new(hook);
        self.hooks.key_connect.store(Some(Arc::new(hook)));
    }

    /// Called when a remote element detaches a key.
    pub fn on_key_disconnect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Key) + Send + Sync + 'static,
    {
        let hook: KeyHook = Box::new(hook);
        self.hooks.key_disconnect.store(Some(Arc::new(hook)));
    }

    /// Called when a remote element attaches a key filter.
    pub fn on_filter_connect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Filter) + Send + Sync + 'static,
    {
        let hook: FilterHook = Box::new(hook);
        self.hooks.filter_connect.store(Some(Arc::new(hook)));
    }

    /// Called when a remote element detaches a key filter.
    pub fn on_filter_disconnect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Filter) + Send + Sync + 'static,
    {
        let hook: FilterHook = Box::new(hook);
        self.hooks.filter_disconnect.store(Some(Arc::new(hook)));
    }

    fn notify_binding(&self, conn: Connection, binding: &Binding, connected: bool) {
        match binding {
            Binding::Key(key) => {
                let slot = if connected {
                    &self.hooks.key_connect
                } else {
                    &self.hooks.key_disconnect
                };
                if let Some(hook) = slot.load_full() {
                    let key = key.clone();
                    self.executor.submit(move || hook(conn, &key));
                }
            }
            Binding::Filter(filter) => {
                let slot = if connected {
                    &self.hooks.filter_connect
                } else {
                    &self.hooks.filter_disconnect
                };
                if let Some(hook) = slot.load_full() {
                    let filter = filter.clone();
                    self.executor.submit(move || hook(conn, &filter));
                }
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Destroy the element. Idempotent.
    ///
    /// Wakes every waiter (they fail with `ElementDestroyed`), stops
    /// forwarding to this element, leaves the topic arena and tells every
    /// attached remote element.
    pub fn destroy(&self) {
        let listeners = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.registry.take_all()
        };
        self.changed.notify_all();
        self.trace_topic(1, format_args!("destroyed, notifying {} listeners", listeners.len()));

        self.forwarders.unregister(&self.facet());
        if let Some(topic) = self.topic.upgrade() {
            topic.remove(self.id);
        }

        // Queued behind anything already pushed; the lanes close once drained.
        for mut listener in listeners {
            listener.push(Envelope::DetachElement { from: self.remote() });
        }
    }

    /// Block until every envelope pushed so far was handed to its session.
    pub fn flush_outbound(&self) {
        let markers = self.state.lock().registry.flush_markers();
        for marker in markers {
            // Err means the worker exited after draining.
            let _ = marker.recv();
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    pub(crate) fn trace_topic(&self, level: u8, args: fmt::Arguments<'_>) {
        if self.trace.topic >= level {
            log::debug!("[{}] {}", self.label, args);
        }
    }

    pub(crate) fn trace_data(&self, level: u8, args: fmt::Arguments<'_>) {
        if self.trace.data >= level {
            log::debug!("[{}] {}", self.label, args);
        }
    }

    pub(crate) fn trace_session(&self, level: u8, args: fmt::Arguments<'_>) {
        if self.trace.session >= level {
            log::debug!("[{}] {}", self.label, args);
        }
    }
}

impl Connection {
    /// Writer identity of the remote element.
    pub fn writer_id(&self) -> WriterId {
        WriterId {
            peer: self.peer,
            topic: self.remote.topic,
            element: self.remote.element,
        }
    }
}

impl ForwardHandler for DataElement {
    fn forward(&self, origin: &Arc<dyn Session>, envelope: Envelope) {
        if self.is_destroyed() {
            log::debug!("[{}] dropped {} from {}: destroyed", self.label, envelope.kind(), origin.peer());
            return;
        }

        match envelope {
            Envelope::Attach {
                from,
                subscriber_id,
                bindings,
                sample_filter,
                priority,
            } => {
                let requests = bindings
                    .into_iter()
                    .map(|binding| AttachRequest {
                        from,
                        subscriber_id,
                        binding,
                        sample_filter: sample_filter.clone(),
                        priority,
                    })
                    .collect();
                self.attach(origin, requests);
            }
            Envelope::AttachKey(request) => {
                self.attach_key(origin, request);
            }
            Envelope::AttachFilter(request) => {
                self.attach_filter(origin, request);
            }
            Envelope::DetachKey { from, key } => {
                self.detach_key(origin.peer(), &from, &key);
            }
            Envelope::DetachFilter { from, filter } => {
                self.detach_filter(origin.peer(), &from, &filter);
            }
            Envelope::DetachElement { from } => {
                self.detach_element(origin.peer(), &from);
            }
            Envelope::Queue { sample, forwarded } => {
                self.queue(sample, origin.peer(), SystemTime::now(), forwarded);
            }
            Envelope::InitSamples { from, samples } => {
                self.init_samples(origin.peer(), &from, samples, SystemTime::now());
            }
        }
    }
}

impl fmt::Debug for DataElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataElement")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .finish()
    }
}
