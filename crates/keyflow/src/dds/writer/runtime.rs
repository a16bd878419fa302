// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::Payload;
use crate::core::{Filter, Key, Sample, SampleEvent};
use crate::engine::{Connection, DataElement};
use crate::error::{Error, Result};
use crate::qos::retention;

/// Writer handle. Dropping it destroys the writer.
pub struct DataWriter {
    element: Arc<DataElement>,
}

impl DataWriter {
    pub(crate) fn new(element: Arc<DataElement>) -> Self {
        Self { element }
    }

    /// Underlying element, for peer-facing operations.
    pub fn element(&self) -> &Arc<DataElement> {
        &self.element
    }

    /// Keys this writer publishes on.
    pub fn keys(&self) -> &[Key] {
        self.element.kind().keys()
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// Publish a full value. `PartialUpdate` fails with
    /// [`Error::UnsupportedEvent`]: use [`partial_update`](Self::partial_update).
    pub fn publish(&self, key: &Key, event: SampleEvent, value: Vec<u8>) -> Result<Sample> {
        if event == SampleEvent::PartialUpdate {
            return Err(Error::UnsupportedEvent(
                "partial updates need an updater tag".to_string(),
            ));
        }
        self.element.publish(key, event, Payload::Value(value))
    }

    /// Open a new instance of `key`.
    pub fn add(&self, key: &Key, value: Vec<u8>) -> Result<Sample> {
        self.publish(key, SampleEvent::Add, value)
    }

    /// Replace the value of `key`.
    pub fn update(&self, key: &Key, value: Vec<u8>) -> Result<Sample> {
        self.publish(key, SampleEvent::Update, value)
    }

    /// Apply `delta` to the last value of `key` with the topic updater
    /// registered under `tag`.
    ///
    /// Fails with [`Error::UnknownUpdater`] if the topic has no such updater.
    pub fn partial_update(&self, key: &Key, tag: &str, delta: Vec<u8>) -> Result<Sample> {
        self.element.publish(
            key,
            SampleEvent::PartialUpdate,
            Payload::Delta {
                tag: tag.to_string(),
                delta,
            },
        )
    }

    /// Close the current instance of `key`.
    pub fn remove(&self, key: &Key) -> Result<Sample> {
        self.publish(key, SampleEvent::Remove, Vec::new())
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Retained window after lifetime pruning, oldest first.
    pub fn get_all(&self) -> Result<Vec<Sample>> {
        let mut state = self.element.state.lock();
        if state.destroyed {
            return Err(Error::ElementDestroyed);
        }
        retention::prune_expired(&mut state.writer.history, &self.element.policy, SystemTime::now());
        Ok(state.writer.history.iter().cloned().collect())
    }

    /// Most recent retained sample.
    pub fn get_last(&self) -> Result<Option<Sample>> {
        let mut state = self.element.state.lock();
        if state.destroyed {
            return Err(Error::ElementDestroyed);
        }
        retention::prune_expired(&mut state.writer.history, &self.element.policy, SystemTime::now());
        Ok(state.writer.history.back().cloned())
    }

    // ========================================================================
    // Readers
    // ========================================================================

    /// Block until readers on at least `count` distinct peers are attached.
    pub fn wait_for_readers(&self, count: usize, timeout: Option<Duration>) -> Result<()> {
        self.element.wait_for_listeners(count, timeout)
    }

    /// Number of distinct peers with an attached reader.
    pub fn reader_peer_count(&self) -> usize {
        self.element.peer_count()
    }

    /// Block until everything published so far was handed to every reader's
    /// session.
    pub fn flush(&self) {
        self.element.flush_outbound();
    }

    /// Whether a reader is attached.
    pub fn has_readers(&self) -> bool {
        self.element.has_listeners()
    }

    /// Keys attached by readers.
    pub fn connected_keys(&self) -> BTreeSet<Key> {
        self.element.connected_keys()
    }

    /// Key filters attached by filtered readers.
    pub fn connected_filters(&self) -> BTreeSet<Filter> {
        self.element.connected_filters()
    }

    pub fn on_key_connect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Key) + Send + Sync + 'static,
    {
        self.element.on_key_connect(hook);
    }

    pub fn on_key_disconnect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Key) + Send + Sync + 'static,
    {
        self.element.on_key_disconnect(hook);
    }

    pub fn on_filter_connect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Filter) + Send + Sync + 'static,
    {
        self.element.on_filter_connect(hook);
    }

    pub fn on_filter_disconnect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Filter) + Send + Sync + 'static,
    {
        self.element.on_filter_disconnect(hook);
    }

    /// Destroy the writer now and tell attached readers.
    pub fn destroy(&self) {
        self.element.destroy();
    }
}

impl Drop for DataWriter {
    fn drop(&mut self) {
        self.element.destroy();
    }
}

impl std::fmt::Debug for DataWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataWriter").field(&self.element).finish()
    }
}
