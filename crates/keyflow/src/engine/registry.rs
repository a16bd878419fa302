// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener/subscriber registry.
//!
//! One [`Listener`] per (remote peer, facet), each owning the
//! [`Subscriber`]s of that facet keyed by remote element and the
//! [`OutboundLane`] envelopes to that facet travel on. The registry is
//! guarded by the element lock; it never invokes a session itself.
//!
//! Invariants:
//! - a subscriber with no bindings is removed immediately,
//! - a listener with no subscribers is removed immediately,
//! - attaching an already attached binding changes nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crossbeam::channel::Receiver;

use super::lane::OutboundLane;
use crate::core::{Filter, Key, Sample};
use crate::session::{AttachRequest, Binding, Envelope, PeerId, RemoteElement, Session};

/// Listener identity: ordered by peer, then facet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey {
    /// Remote peer.
    pub peer: PeerId,
    /// Facet the peer is reached through.
    pub facet: String,
}

/// One remote element attached to this element.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Id chosen by the remote element.
    pub id: u64,
    /// The remote element.
    pub remote: RemoteElement,
    /// Attached keys and key filters.
    pub bindings: BTreeSet<Binding>,
    /// Content filter applied before delivery.
    pub sample_filter: Option<Filter>,
    /// Remote priority (writers only).
    pub priority: i32,
}

impl Subscriber {
    /// Whether any binding covers `key`.
    pub fn covers(&self, key: &Key) -> bool {
        self.bindings.iter().any(|b| b.covers(key))
    }

    /// Whether `sample` should be delivered to this subscriber.
    pub fn accepts(&self, sample: &Sample) -> bool {
        self.covers(sample.key())
            && self
                .sample_filter
                .as_ref()
                .is_none_or(|f| f.match_sample(sample))
    }
}

/// Subscribers reached through one (peer, facet).
pub struct Listener {
    lane: OutboundLane,
    subscribers: BTreeMap<RemoteElement, Subscriber>,
}

impl Listener {
    /// Session used to reach the peer.
    pub fn session(&self) -> &Arc<dyn Session> {
        self.lane.session()
    }

    /// Queue `envelope` to this listener's facet.
    pub fn push(&mut self, envelope: Envelope) {
        self.lane.push(envelope);
    }

    /// Subscribers of this listener.
    pub fn subscribers(&self) -> impl Iterator<Item = &Subscriber> {
        self.subscribers.values()
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("peer", &self.session().peer())
            .field("facet", &self.lane.facet())
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

/// Result of a detach.
#[derive(Debug)]
pub enum DetachOutcome {
    /// The binding was not attached.
    Absent,
    /// The binding was removed; the subscriber still has others.
    Detached,
    /// The binding was the subscriber's last one; the subscriber is gone.
    SubscriberRemoved(Subscriber),
}

impl DetachOutcome {
    /// Whether the binding was attached before the call.
    pub fn was_present(&self) -> bool {
        !matches!(self, DetachOutcome::Absent)
    }
}

/// Per-element registry of attached remote elements.
#[derive(Debug, Default)]
pub struct Registry {
    listeners: BTreeMap<ListenerKey, Listener>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `request` received over `session`.
    ///
    /// Returns `true` if the binding was not attached yet.
    pub fn attach(&mut self, session: &Arc<dyn Session>, request: &AttachRequest) -> bool {
        let key = ListenerKey {
            peer: session.peer(),
            facet: request.from.facet(),
        };
        let listener = self.listeners.entry(key).or_insert_with_key(|key| Listener {
            lane: OutboundLane::new(Arc::clone(session), key.facet.clone()),
            subscribers: BTreeMap::new(),
        });

        let subscriber = listener
            .subscribers
            .entry(request.from)
            .or_insert_with(|| Subscriber {
                id: request.subscriber_id,
                remote: request.from,
                bindings: BTreeSet::new(),
                sample_filter: request.sample_filter.clone(),
                priority: request.priority,
            });
        subscriber.bindings.insert(request.binding.clone())
    }

    /// Remove `binding` from the subscriber of `remote` on `peer`.
    pub fn detach(&mut self, peer: PeerId, remote: &RemoteElement, binding: &Binding) -> DetachOutcome {
        let key = ListenerKey {
            peer,
            facet: remote.facet(),
        };
        let Some(listener) = self.listeners.get_mut(&key) else {
            return DetachOutcome::Absent;
        };
        let Some(subscriber) = listener.subscribers.get_mut(remote) else {
            return DetachOutcome::Absent;
        };
        if !subscriber.bindings.remove(binding) {
            return DetachOutcome::Absent;
        }
        if !subscriber.bindings.is_empty() {
            return DetachOutcome::Detached;
        }

        let removed = listener.subscribers.remove(remote);
        if listener.subscribers.is_empty() {
            self.listeners.remove(&key);
        }
        match removed {
            Some(subscriber) => DetachOutcome::SubscriberRemoved(subscriber),
            None => DetachOutcome::Detached,
        }
    }

    /// Remove the whole subscriber of `remote` on `peer`.
    pub fn detach_element(&mut self, peer: PeerId, remote: &RemoteElement) -> Option<Subscriber> {
        let key = ListenerKey {
            peer,
            facet: remote.facet(),
        };
        let listener = self.listeners.get_mut(&key)?;
        let removed = listener.subscribers.remove(remote);
        if listener.subscribers.is_empty() {
            self.listeners.remove(&key);
        }
        removed
    }

    /// Remove every listener of `peer`. Returns the removed subscribers.
    pub fn disconnect_peer(&mut self, peer: PeerId) -> Vec<Subscriber> {
        let keys: Vec<ListenerKey> = self
            .listeners
            .keys()
            .filter(|k| k.peer == peer)
            .cloned()
            .collect();

        keys.into_iter()
            .filter_map(|k| self.listeners.remove(&k))
            .flat_map(|l| l.subscribers.into_values())
            .collect()
    }

    /// Whether at least one subscriber would receive `sample`.
    pub fn matches_any(&self, sample: &Sample) -> bool {
        self.listeners
            .values()
            .flat_map(|l| l.subscribers.values())
            .any(|s| s.accepts(sample))
    }

    /// Listeners with a subscriber accepting `sample`.
    pub fn targets_for(&self, sample: &Sample) -> Vec<ListenerKey> {
        self.listeners
            .iter()
            .filter(|(_, l)| l.subscribers.values().any(|s| s.accepts(sample)))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Queue `envelope` on the lane of listener `key`. Returns `false` if
    /// the listener is gone.
    pub fn push(&mut self, key: &ListenerKey, envelope: Envelope) -> bool {
        match self.listeners.get_mut(key) {
            Some(listener) => {
                listener.push(envelope);
                true
            }
            None => false,
        }
    }

    /// Flush markers of every lane that carried an envelope.
    pub(crate) fn flush_markers(&self) -> Vec<Receiver<()>> {
        self.listeners
            .values()
            .filter_map(|l| l.lane.flush_marker())
            .collect()
    }

    /// Remove every listener, emptying the registry.
    pub fn take_all(&mut self) -> Vec<Listener> {
        std::mem::take(&mut self.listeners).into_values().collect()
    }

    /// Subscriber of `remote` on `peer`.
    pub fn subscriber(&self, peer: PeerId, remote: &RemoteElement) -> Option<&Subscriber> {
        let key = ListenerKey {
            peer,
            facet: remote.facet(),
        };
        self.listeners.get(&key)?.subscribers.get(remote)
    }

    /// Every (peer, subscriber), in listener order.
    pub fn subscribers(&self) -> impl Iterator<Item = (PeerId, &Subscriber)> {
        self.listeners
            .iter()
            .flat_map(|(k, l)| l.subscribers.values().map(move |s| (k.peer, s)))
    }

    /// Keys attached by at least one subscriber.
    pub fn connected_keys(&self) -> BTreeSet<Key> {
        self.subscribers()
            .flat_map(|(_, s)| s.bindings.iter())
            .filter_map(|b| match b {
                Binding::Key(k) => Some(k.clone()),
                Binding::Filter(_) => None,
            })
            .collect()
    }

    /// Filters attached by at least one subscriber.
    pub fn connected_filters(&self) -> BTreeSet<Filter> {
        self.subscribers()
            .flat_map(|(_, s)| s.bindings.iter())
            .filter_map(|b| match b {
                Binding::Filter(f) => Some(f.clone()),
                Binding::Key(_) => None,
            })
            .collect()
    }

    /// Number of (peer, facet) listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of distinct peers.
    pub fn peer_count(&self) -> usize {
        let mut peers: Vec<PeerId> = self.listeners.keys().map(|k| k.peer).collect();
        peers.dedup();
        peers.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SampleEvent, WriterId};
    use crate::session::{ForwarderRegistry, LocalSession};
    use std::time::SystemTime;

    fn session(peer: u64) -> Arc<dyn Session> {
        LocalSession::loopback(PeerId(peer), Arc::new(ForwarderRegistry::new()))
    }

    fn remote(element: u64) -> RemoteElement {
        RemoteElement { topic: 1, element }
    }

    fn request(element: u64, binding: Binding) -> AttachRequest {
        AttachRequest {
            from: remote(element),
            subscriber_id: element,
            binding,
            sample_filter: None,
            priority: 0,
        }
    }

    fn key(k: &str) -> Binding {
        Binding::Key(Key::from(k))
    }

    fn sample(k: &str, event: SampleEvent) -> Sample {
        let origin = WriterId {
            peer: PeerId(0),
            topic: 1,
            element: 1,
        };
        Sample::new(origin, 1, Key::from(k), event, Vec::new(), SystemTime::now())
    }

    #[test]
    fn attach_is_idempotent() {
        let mut registry = Registry::new();
        let s = session(1);

        assert!(registry.attach(&s, &request(5, key("a"))));
        assert!(!registry.attach(&s, &request(5, key("a"))));
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(
            registry
                .subscriber(PeerId(1), &remote(5))
                .map(|s| s.bindings.len()),
            Some(1)
        );
    }

    #[test]
    fn last_detach_prunes_subscriber_and_listener() {
        let mut registry = Registry::new();
        let s = session(1);
        registry.attach(&s, &request(5, key("a")));
        registry.attach(&s, &request(5, key("b")));

        assert!(matches!(
            registry.detach(PeerId(1), &remote(5), &key("a")),
            DetachOutcome::Detached
        ));
        assert!(!registry.detach(PeerId(1), &remote(5), &key("a")).was_present());
        assert!(matches!(
            registry.detach(PeerId(1), &remote(5), &key("b")),
            DetachOutcome::SubscriberRemoved(_)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn matches_any_honors_bindings_and_sample_filters() {
        let mut registry = Registry::new();
        let s = session(1);
        let mut filtered = request(5, Binding::Filter(Filter::key_prefix("sensor/")));
        filtered.sample_filter = Some(Filter::sample_events(&[SampleEvent::Remove]));
        registry.attach(&s, &filtered);

        assert!(!registry.matches_any(&sample("pump/1", SampleEvent::Remove)));
        assert!(!registry.matches_any(&sample("sensor/1", SampleEvent::Add)));
        assert!(registry.matches_any(&sample("sensor/1", SampleEvent::Remove)));
        assert_eq!(registry.targets_for(&sample("sensor/1", SampleEvent::Remove)).len(), 1);
    }

    #[test]
    fn listeners_order_by_peer_then_facet() {
        let mut registry = Registry::new();
        registry.attach(&session(2), &request(1, key("a")));
        registry.attach(&session(1), &request(9, key("a")));
        registry.attach(&session(1), &request(3, key("a")));

        let order: Vec<_> = registry
            .subscribers()
            .map(|(p, s)| (p.0, s.remote.element))
            .collect();
        assert_eq!(order, [(1, 3), (1, 9), (2, 1)]);
        assert_eq!(registry.peer_count(), 2);
        assert_eq!(registry.listener_count(), 3);
    }

    #[test]
    fn disconnect_removes_all_listeners_of_peer() {
        let mut registry = Registry::new();
        registry.attach(&session(1), &request(1, key("a")));
        registry.attach(&session(1), &request(2, key("b")));
        registry.attach(&session(2), &request(3, key("c")));

        let removed = registry.disconnect_peer(PeerId(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(
            registry.connected_keys().into_iter().collect::<Vec<_>>(),
            vec![Key::from("c")]
        );
        assert!(registry.detach_element(PeerId(2), &remote(3)).is_some());
        assert!(registry.is_empty());
    }
}
