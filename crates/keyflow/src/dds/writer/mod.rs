// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DataWriter
//!
//! A [`DataWriter`] publishes samples on a fixed key set. Every sample gets
//! the next id for its key, goes through the retention engine on the
//! writer's history, then fans out to every attached reader whose binding
//! covers the key and whose sample filter accepts it.
//!
//! The retained history is the backfill a newly attached reader receives.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keyflow::{ClearHistoryPolicy, ElementConfig, Key, Topic, Result};
//!
//! fn main() -> Result<()> {
//!     let topic = Topic::new("inventory")?;
//!     topic.set_updater("append", |prev, delta| [prev, delta].concat());
//!
//!     let writer = topic
//!         .writer()
//!         .key("shelf/3")
//!         .config(ElementConfig::default().clear_history(ClearHistoryPolicy::OnAllExceptPartialUpdate))
//!         .build()?;
//!
//!     let shelf = Key::from("shelf/3");
//!     writer.add(&shelf, b"bolts".to_vec())?;
//!     writer.partial_update(&shelf, "append", b",nuts".to_vec())?;
//!     assert_eq!(writer.get_last()?.and_then(|s| s.value_str().map(str::to_owned)).as_deref(), Some("bolts,nuts"));
//!     Ok(())
//! }
//! ```

mod builder;
mod runtime;

pub use builder::WriterBuilder;
pub use runtime::DataWriter;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::{Filter, Key, PartialUpdate, Sample, SampleEvent};
use crate::engine::{Capability, DataElement};
use crate::error::{Error, Result};
use crate::qos::{retention, RetentionPolicy};
use crate::session::{Binding, Envelope};

/// Writer half of the element state.
#[derive(Debug, Default)]
pub(crate) struct WriterState {
    /// Retained samples, oldest first.
    pub(crate) history: VecDeque<Sample>,
    /// Last assigned id per key.
    last_ids: HashMap<Key, u64>,
    /// Last published value per key, input of partial updates.
    last_values: HashMap<Key, Arc<[u8]>>,
}

impl WriterState {
    /// Retained samples covered by `binding`, accepted by `sample_filter`
    /// and newer than `after_id`, in retained order.
    pub(crate) fn backfill(
        &mut self,
        binding: &Binding,
        sample_filter: Option<&Filter>,
        after_id: u64,
        policy: &RetentionPolicy,
        now: SystemTime,
    ) -> Vec<Sample> {
        retention::prune_expired(&mut self.history, policy, now);
        self.history
            .iter()
            .filter(|s| s.id() > after_id && binding.covers(s.key()))
            .filter(|s| sample_filter.is_none_or(|f| f.match_sample(s)))
            .cloned()
            .collect()
    }
}

/// Payload of one publication.
pub(crate) enum Payload {
    /// Full value (`Add`, `Update`, `Remove`).
    Value(Vec<u8>),
    /// Delta applied by the topic updater registered under `tag`.
    Delta { tag: String, delta: Vec<u8> },
}

impl DataElement {
    pub(crate) fn publish(&self, key: &Key, event: SampleEvent, payload: Payload) -> Result<Sample> {
        // Resolved before locking: the arena lock is never taken under the element lock.
        let updater = match &payload {
            Payload::Delta { tag, .. } => {
                let topic = self.topic.upgrade().ok_or(Error::ElementDestroyed)?;
                Some(topic.updater(tag).ok_or_else(|| Error::UnknownUpdater(tag.clone()))?)
            }
            Payload::Value(_) => None,
        };

        let mut state = self.state.lock();
        if state.destroyed {
            return Err(Error::ElementDestroyed);
        }
        if !self.kind.match_key(key) {
            return Err(Error::UnknownKey(key.to_string()));
        }

        let (value, update) = match (payload, updater) {
            (Payload::Delta { tag, delta }, Some(updater)) => {
                let previous = state
                    .writer
                    .last_values
                    .get(key)
                    .map(Arc::clone)
                    .unwrap_or_else(|| Arc::from(Vec::new()));
                let value = updater(&previous[..], &delta[..]);
                let update = PartialUpdate {
                    tag: Arc::from(tag),
                    delta: Arc::from(delta),
                };
                (value, Some(update))
            }
            (Payload::Delta { tag, .. }, None) => return Err(Error::UnknownUpdater(tag)),
            (Payload::Value(value), _) => (value, None),
        };

        let id = {
            let last = state.writer.last_ids.entry(key.clone()).or_insert(0);
            *last += 1;
            *last
        };

        let now = SystemTime::now();
        let mut sample = Sample::new(self.origin, id, key.clone(), event, value, now);
        if let Some(update) = update {
            sample = sample.with_partial_update(update);
        }
        state
            .writer
            .last_values
            .insert(key.clone(), Arc::from(sample.value()));

        let evicted = retention::insert(&mut state.writer.history, sample.clone(), &self.policy, now);
        self.trace_data(
            2,
            format_args!("published {} #{} on {}, {} evicted", event, id, key, evicted),
        );

        if !state.registry.matches_any(&sample) {
            return Ok(sample);
        }
        for listener in state.registry.targets_for(&sample) {
            let envelope = Envelope::Queue {
                sample: sample.clone(),
                forwarded: false,
            };
            state.registry.push(&listener, envelope);
        }
        Ok(sample)
    }

    /// Retained samples a subscriber attached through `binding` is entitled to.
    pub fn get_samples(
        &self,
        binding: &Binding,
        sample_filter: Option<&Filter>,
        after_id: u64,
    ) -> Result<Vec<Sample>> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(Error::ElementDestroyed);
        }
        Ok(state
            .writer
            .backfill(binding, sample_filter, after_id, &self.policy, SystemTime::now()))
    }
}
