// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::Key;
use crate::session::PeerId;
use crate::{ElementId, TopicId};

/// Kind of change a sample carries for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleEvent {
    /// Starts a new key instance.
    Add,
    /// Replaces the value of the key.
    Update,
    /// Applies a named updater to the previous value.
    PartialUpdate,
    /// Ends the current key instance.
    Remove,
}

impl SampleEvent {
    /// All events, in declaration order.
    pub const ALL: [SampleEvent; 4] = [
        SampleEvent::Add,
        SampleEvent::Update,
        SampleEvent::PartialUpdate,
        SampleEvent::Remove,
    ];
}

impl fmt::Display for SampleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleEvent::Add => "Add",
            SampleEvent::Update => "Update",
            SampleEvent::PartialUpdate => "PartialUpdate",
            SampleEvent::Remove => "Remove",
        };
        f.write_str(name)
    }
}

/// Identity of the writer element that produced a sample.
///
/// The derived ordering (peer, then topic, then element) is the tie-breaker
/// used by priority arbitration, so every peer computes the same ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriterId {
    /// Node hosting the writer.
    pub peer: PeerId,
    /// Topic id on that node.
    pub topic: TopicId,
    /// Element id within the topic.
    pub element: ElementId,
}

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.peer, self.topic, self.element)
    }
}

/// Updater tag and encoded delta of a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialUpdate {
    /// Tag of the topic updater that produced the value.
    pub tag: Arc<str>,
    /// Encoded delta handed to the updater.
    pub delta: Arc<[u8]>,
}

/// One immutable unit of data flow.
///
/// Ids are assigned by the producing writer and are strictly increasing per
/// (writer, key). For [`SampleEvent::PartialUpdate`] samples, `value` holds
/// the result of applying the updater; the delta itself is kept in
/// [`Sample::partial_update`].
#[derive(Debug, Clone)]
pub struct Sample {
    id: u64,
    event: SampleEvent,
    key: Key,
    value: Arc<[u8]>,
    timestamp: SystemTime,
    origin: WriterId,
    update: Option<PartialUpdate>,
}

impl Sample {
    /// Build a sample.
    pub fn new(
        origin: WriterId,
        id: u64,
        key: Key,
        event: SampleEvent,
        value: impl Into<Vec<u8>>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            id,
            event,
            key,
            value: Arc::from(value.into()),
            timestamp,
            origin,
            update: None,
        }
    }

    /// Attach the updater tag and delta of a partial update.
    #[must_use]
    pub fn with_partial_update(mut self, update: PartialUpdate) -> Self {
        self.update = Some(update);
        self
    }

    /// Id, unique per (producing writer, key).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Event kind.
    pub fn event(&self) -> SampleEvent {
        self.event
    }

    /// Key the sample was published on.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Encoded value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Value as text, if valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Publication timestamp (writer clock).
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Producing writer.
    pub fn origin(&self) -> WriterId {
        self.origin
    }

    /// Updater tag and delta, for partial updates.
    pub fn partial_update(&self) -> Option<&PartialUpdate> {
        self.update.as_ref()
    }
}
