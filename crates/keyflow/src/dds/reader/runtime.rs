// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Key, Sample};
use crate::engine::{Connection, DataElement};
use crate::error::{Error, Result};
use crate::Filter;

/// Reader handle. Dropping it destroys the reader.
pub struct DataReader {
    element: Arc<DataElement>,
}

impl DataReader {
    pub(crate) fn new(element: Arc<DataElement>) -> Self {
        Self { element }
    }

    /// Underlying element, for peer-facing operations.
    pub fn element(&self) -> &Arc<DataElement> {
        &self.element
    }

    /// Block until a sample is unread, then take it.
    ///
    /// Fails with [`Error::ElementDestroyed`] once the reader is destroyed.
    pub fn get_next_unread(&self) -> Result<Sample> {
        self.next_unread(None)
    }

    /// Like [`get_next_unread`](Self::get_next_unread), failing with
    /// [`Error::Timeout`] after `timeout`.
    pub fn get_next_unread_timeout(&self, timeout: Duration) -> Result<Sample> {
        self.next_unread(Some(timeout))
    }

    fn next_unread(&self, timeout: Option<Duration>) -> Result<Sample> {
        self.element.wait_until(timeout, |state| {
            self.element.prune_unread(state);
            state.reader.unread.pop_front()
        })
    }

    /// Take every unread sample without blocking.
    pub fn get_all_unread(&self) -> Result<Vec<Sample>> {
        let mut state = self.element.state.lock();
        if state.destroyed {
            return Err(Error::ElementDestroyed);
        }
        self.element.prune_unread(&mut state);
        Ok(state.reader.unread.drain(..).collect())
    }

    /// Whether a sample is unread.
    pub fn has_unread(&self) -> bool {
        let mut state = self.element.state.lock();
        self.element.prune_unread(&mut state);
        !state.reader.unread.is_empty()
    }

    /// Block until at least `count` samples are unread.
    pub fn wait_for_unread(&self, count: usize, timeout: Option<Duration>) -> Result<()> {
        self.element.wait_until(timeout, |state| {
            self.element.prune_unread(state);
            (state.reader.unread.len() >= count).then_some(())
        })
    }

    /// Open key instances across attached writers.
    pub fn instance_count(&self) -> usize {
        self.element.state.lock().reader.instance_count()
    }

    /// Block until writers on at least `count` distinct peers are attached.
    pub fn wait_for_writers(&self, count: usize, timeout: Option<Duration>) -> Result<()> {
        self.element.wait_for_listeners(count, timeout)
    }

    /// Whether a writer is attached.
    pub fn has_writers(&self) -> bool {
        self.element.has_listeners()
    }

    /// Keys attached by writers.
    pub fn connected_keys(&self) -> BTreeSet<Key> {
        self.element.connected_keys()
    }

    /// Called for every accepted sample, in acceptance order.
    pub fn on_sample<F>(&self, hook: F)
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        let hook: crate::engine::element::SampleHook = Box::new(hook);
        self.element.hooks.sample.store(Some(Arc::new(hook)));
    }

    /// Called once per backfill batch with the accepted samples.
    pub fn on_init<F>(&self, hook: F)
    where
        F: Fn(&[Sample]) + Send + Sync + 'static,
    {
        let hook: crate::engine::element::InitHook = Box::new(hook);
        self.element.hooks.init.store(Some(Arc::new(hook)));
    }

    /// Called when a writer attaches a key.
    pub fn on_key_connect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Key) + Send + Sync + 'static,
    {
        self.element.on_key_connect(hook);
    }

    /// Called when a writer detaches a key.
    pub fn on_key_disconnect<F>(&self, hook: F)
    where
        F: Fn(Connection, &Key) + Send + Sync + 'static,
    {
        self.element.on_key_disconnect(hook);
    }

    /// Called when a writer attaches a key filter.
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

    /// Destroy the reader now. Blocked calls fail with `ElementDestroyed`.
    pub fn destroy(&self) {
        self.element.destroy();
    }
}

impl Drop for DataReader {
    fn drop(&mut self) {
        self.element.destroy();
    }
}

impl std::fmt::Debug for DataReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataReader").field(&self.element).finish()
    }
}
