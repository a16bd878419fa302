// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session layer seen by the engine.
//!
//! The transport that carries calls between processes is external; the
//! engine only needs:
//!
//! - a [`Session`]: identity of the remote peer plus a non-blocking `invoke`
//!   scoped to a facet,
//! - an [`Envelope`]: the decoded call,
//! - a [`ForwarderRegistry`]: the per-node dispatch table routing an envelope
//!   to the element registered under its facet.
//!
//! [`LocalSession`] implements [`Session`] in-process (loopback or a pair of
//! registries), which is what local auto-binding and the tests run on.

use std::fmt;

use crate::core::{Filter, Key, Sample};
use crate::error::Result;
use crate::{ElementId, TopicId};

mod forwarder;
mod local;

pub use forwarder::{ForwardHandler, ForwarderRegistry};
pub use local::LocalSession;

/// Identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A data element as seen from another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteElement {
    /// Topic id on the element's node.
    pub topic: TopicId,
    /// Element id within that topic.
    pub element: ElementId,
}

impl RemoteElement {
    /// Facet the element is registered under on its node.
    pub fn facet(&self) -> String {
        format!("{}.{}", self.topic, self.element)
    }
}

impl fmt::Display for RemoteElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.element)
    }
}

/// What a subscriber is attached through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Binding {
    /// A single key.
    Key(Key),
    /// Every key a key filter accepts.
    Filter(Filter),
}

impl Binding {
    /// Whether samples on `key` flow through this binding.
    pub fn covers(&self, key: &Key) -> bool {
        match self {
            Binding::Key(k) => k == key,
            Binding::Filter(f) => f.match_key(key),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Key(k) => write!(f, "key {}", k),
            Binding::Filter(filter) => write!(f, "filter {}", filter),
        }
    }
}

/// Parameters of an attachment request.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    /// Requesting element.
    pub from: RemoteElement,
    /// Subscriber id chosen by the requester.
    pub subscriber_id: u64,
    /// Key or filter to attach.
    pub binding: Binding,
    /// Content filter applied before delivery to this subscriber.
    pub sample_filter: Option<Filter>,
    /// Priority of the requester when it is a writer.
    pub priority: i32,
}

/// Decoded peer call, addressed to one element facet.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Batch handshake: several bindings of one remote element.
    Attach {
        /// Requesting element.
        from: RemoteElement,
        /// Subscriber id chosen by the requester.
        subscriber_id: u64,
        /// Bindings to attach.
        bindings: Vec<Binding>,
        /// Content filter for every binding.
        sample_filter: Option<Filter>,
        /// Requester priority.
        priority: i32,
    },
    /// Attach one key.
    AttachKey(AttachRequest),
    /// Detach one key.
    DetachKey {
        /// Requesting element.
        from: RemoteElement,
        /// Key to detach.
        key: Key,
    },
    /// Attach one key filter.
    AttachFilter(AttachRequest),
    /// Detach one key filter.
    DetachFilter {
        /// Requesting element.
        from: RemoteElement,
        /// Filter to detach.
        filter: Filter,
    },
    /// The remote element was destroyed.
    DetachElement {
        /// Destroyed element.
        from: RemoteElement,
    },
    /// A published sample.
    Queue {
        /// The sample.
        sample: Sample,
        /// Whether an intermediate node relayed it.
        forwarded: bool,
    },
    /// Retained history sent to a newly attached subscriber.
    InitSamples {
        /// Sending writer.
        from: RemoteElement,
        /// Backfill, in retained order.
        samples: Vec<Sample>,
    },
}

impl Envelope {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Attach { .. } => "attach",
            Envelope::AttachKey(_) => "attach-key",
            Envelope::DetachKey { .. } => "detach-key",
            Envelope::AttachFilter(_) => "attach-filter",
            Envelope::DetachFilter { .. } => "detach-filter",
            Envelope::DetachElement { .. } => "detach-element",
            Envelope::Queue { .. } => "queue",
            Envelope::InitSamples { .. } => "init-samples",
        }
    }
}

/// Connection to one remote peer.
///
/// The engine calls `invoke` from one worker per (peer, facet), in the
/// order envelopes were produced. A slow `invoke` delays only that facet.
pub trait Session: Send + Sync {
    /// Identity of the remote peer.
    fn peer(&self) -> PeerId;

    /// Deliver `envelope` to the element registered under `facet` on the peer.
    fn invoke(&self, facet: &str, envelope: Envelope) -> Result<()>;

    /// Whether the session is still usable.
    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facet_is_derived_from_ids() {
        let remote = RemoteElement {
            topic: 3,
            element: 12,
        };
        assert_eq!(remote.facet(), "3.12");
        assert_eq!(remote.to_string(), "3/12");
    }

    #[test]
    fn bindings_cover_keys() {
        let key = Binding::Key(Key::from("a"));
        let prefix = Binding::Filter(Filter::key_prefix("sensor/"));

        assert!(key.covers(&Key::from("a")));
        assert!(!key.covers(&Key::from("b")));
        assert!(prefix.covers(&Key::from("sensor/1")));
        assert!(!prefix.covers(&Key::from("pump/1")));
    }
}
