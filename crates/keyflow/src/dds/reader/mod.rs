// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DataReader
//!
//! A [`DataReader`] receives samples for its keys (or for every key its
//! filter accepts) from the writers attached to it.
//!
//! ## Acceptance path
//!
//! Every incoming sample, live (`queue`) or backfill (`init_samples`), goes
//! through the same steps under the element lock:
//!
//! 1. dedupe on (writer, key, id)
//! 2. key capability and the reader's sample filter
//! 3. writer arbitration: only the top-ranked writer of the key
//! 4. discard policy (`SendTime` drops samples older than the key's last one)
//! 5. instance tracking (`Add` opens, `Remove` closes)
//! 6. retention insert into the unread queue
//!
//! Accepted samples wake blocked readers and are handed to `on_sample` in
//! acceptance order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keyflow::{Key, Topic, Result};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     let topic = Topic::new("sensors")?;
//!     let reader = topic.reader().key("temp/1").build()?;
//!
//!     reader.wait_for_writers(1, Some(Duration::from_secs(1)))?;
//!     while let Ok(sample) = reader.get_next_unread_timeout(Duration::from_millis(100)) {
//!         println!("{} {} {:?}", sample.key(), sample.event(), sample.value_str());
//!     }
//!     Ok(())
//! }
//! ```

mod builder;
mod runtime;

pub use builder::ReaderBuilder;
pub use runtime::DataReader;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::{Key, Sample, WriterId};
use crate::engine::element::ElementState;
use crate::engine::{Capability, DataElement};
use crate::qos::{retention, DiscardPolicy, ElementRole};
use crate::session::{PeerId, RemoteElement};
use crate::SampleEvent;

/// Reader half of the element state.
#[derive(Debug, Default)]
pub(crate) struct ReaderState {
    /// Retained, not yet read samples.
    pub(crate) unread: VecDeque<Sample>,
    /// Highest accepted id per (writer, key).
    last_ids: HashMap<(WriterId, Key), u64>,
    /// Latest accepted timestamp per key, for `SendTime` discard.
    last_stamps: HashMap<Key, SystemTime>,
    /// Open instances per (writer, key).
    instances: HashSet<(WriterId, Key)>,
}

impl ReaderState {
    /// Open key instances across attached writers.
    pub(crate) fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn forget_instance(&mut self, writer: WriterId, key: &Key) {
        self.instances.remove(&(writer, key.clone()));
    }

    /// Drop everything tracked for a released writer. A writer that attaches
    /// again starts over with a full backfill.
    pub(crate) fn forget_writer(&mut self, writer: WriterId) {
        self.instances.retain(|(w, _)| *w != writer);
        self.last_ids.retain(|(w, _), _| *w != writer);
        let last_ids = &self.last_ids;
        self.last_stamps
            .retain(|key, _| last_ids.keys().any(|(_, k)| k == key));
    }

    /// Number of (writer, key) pairs tracked for dedupe.
    pub(crate) fn tracked_streams(&self) -> usize {
        self.last_ids.len()
    }
}

impl DataElement {
    /// Deliver one live sample received from `source`.
    ///
    /// Returns `true` if the sample was accepted.
    pub fn queue(&self, sample: Sample, source: PeerId, received_at: SystemTime, forwarded: bool) -> bool {
        if self.role() != ElementRole::Reader {
            log::debug!("[{}] queue from {} ignored: not a reader", self.label, source);
            return false;
        }

        let mut state = self.state.lock();
        if state.destroyed {
            log::debug!("[{}] queue from {} ignored: destroyed", self.label, source);
            return false;
        }

        self.trace_data(
            3,
            format_args!(
                "queue {} #{} on {} from {}{}",
                sample.event(),
                sample.id(),
                sample.key(),
                sample.origin(),
                if forwarded { " (forwarded)" } else { "" }
            ),
        );

        let Some(sample) = self.accept(&mut state, sample, received_at) else {
            return false;
        };
        self.changed.notify_all();

        if let Some(hook) = self.hooks.sample.load_full() {
            self.executor.submit(move || hook(&sample));
        }
        true
    }

    /// Deliver backfill sent by writer `from` on `source` after an attach.
    ///
    /// Samples go through the same acceptance path as [`queue`](Self::queue).
    /// `on_sample` runs for each accepted sample, then `on_init` once with the
    /// accepted batch. Returns the number of accepted samples.
    pub fn init_samples(
        &self,
        source: PeerId,
        from: &RemoteElement,
        samples: Vec<Sample>,
        received_at: SystemTime,
    ) -> usize {
        if self.role() != ElementRole::Reader {
            log::debug!("[{}] init samples from {} ignored: not a reader", self.label, source);
            return 0;
        }

        let mut state = self.state.lock();
        if state.destroyed {
            return 0;
        }

        let offered = samples.len();
        let accepted: Vec<Sample> = samples
            .into_iter()
            .filter_map(|s| self.accept(&mut state, s, received_at))
            .collect();
        self.trace_data(
            1,
            format_args!("init from {}/{}: {} of {} accepted", source, from, accepted.len(), offered),
        );
        if accepted.is_empty() {
            return 0;
        }
        self.changed.notify_all();

        let count = accepted.len();
        let accepted = Arc::new(accepted);
        if let Some(hook) = self.hooks.sample.load_full() {
            let batch = Arc::clone(&accepted);
            self.executor.submit(move || batch.iter().for_each(|s| hook(s)));
        }
        if let Some(hook) = self.hooks.init.load_full() {
            self.executor.submit(move || hook(accepted.as_slice()));
        }
        count
    }

    fn accept(&self, state: &mut ElementState, sample: Sample, now: SystemTime) -> Option<Sample> {
        let writer = sample.origin();
        let id_key = (writer, sample.key().clone());

        if state.reader.last_ids.get(&id_key).is_some_and(|last| sample.id() <= *last) {
            self.trace_data(2, format_args!("duplicate #{} from {}", sample.id(), writer));
            return None;
        }

        if !self.kind.match_key(sample.key()) {
            return None;
        }
        if self
            .sample_filter
            .as_ref()
            .is_some_and(|f| !f.match_sample(&sample))
        {
            self.trace_data(3, format_args!("#{} rejected by sample filter", sample.id()));
            return None;
        }

        if !state.ranking.accepts(sample.key(), writer) {
            self.trace_data(2, format_args!("#{} from {} outranked on {}", sample.id(), writer, sample.key()));
            return None;
        }

        if self.policy.discard == DiscardPolicy::SendTime {
            let stale = state
                .reader
                .last_stamps
                .get(sample.key())
                .is_some_and(|last| sample.timestamp() < *last);
            if stale {
                self.trace_data(2, format_args!("#{} discarded: older than last sample", sample.id()));
                return None;
            }
        }

        match sample.event() {
            SampleEvent::Add => {
                state.reader.instances.insert(id_key.clone());
            }
            SampleEvent::Remove => {
                state.reader.instances.remove(&id_key);
            }
            SampleEvent::Update | SampleEvent::PartialUpdate => {}
        }

        state.reader.last_ids.insert(id_key, sample.id());
        let stamp = state
            .reader
            .last_stamps
            .entry(sample.key().clone())
            .or_insert(sample.timestamp());
        if sample.timestamp() > *stamp {
            *stamp = sample.timestamp();
        }

        let evicted = retention::insert(&mut state.reader.unread, sample.clone(), &self.policy, now);
        if evicted > 0 {
            self.trace_data(3, format_args!("retention evicted {} samples", evicted));
        }
        Some(sample)
    }

    /// Prune expired samples from the unread queue.
    pub(crate) fn prune_unread(&self, state: &mut ElementState) {
        retention::prune_expired(&mut state.reader.unread, &self.policy, SystemTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementConfig, Topic};
    use std::time::Duration;

    fn writer_id(peer: u64) -> WriterId {
        WriterId {
            peer: PeerId(peer),
            topic: 1,
            element: 1,
        }
    }

    fn sample(peer: u64, id: u64, key: &str, event: SampleEvent, value: &str) -> Sample {
        Sample::new(writer_id(peer), id, Key::from(key), event, value.as_bytes().to_vec(), SystemTime::now())
    }

    fn reader(topic: &Topic, config: ElementConfig) -> DataReader {
        topic.reader().key("k").config(config).build().expect("reader")
    }

    #[test]
    fn duplicates_are_dropped() {
        let topic = Topic::new("dedupe").expect("topic");
        let reader = reader(&topic, ElementConfig::default());
        let element = reader.element();

        assert!(element.queue(sample(1, 1, "k", SampleEvent::Add, "a"), PeerId(1), SystemTime::now(), false));
        assert!(!element.queue(sample(1, 1, "k", SampleEvent::Add, "a"), PeerId(1), SystemTime::now(), false));
        assert!(element.queue(sample(1, 2, "k", SampleEvent::Update, "b"), PeerId(1), SystemTime::now(), false));
        assert_eq!(reader.get_all_unread().expect("alive").len(), 2);
    }

    #[test]
    fn other_keys_are_rejected() {
        let topic = Topic::new("keys").expect("topic");
        let reader = reader(&topic, ElementConfig::default());
        assert!(!reader
            .element()
            .queue(sample(1, 1, "other", SampleEvent::Add, "a"), PeerId(1), SystemTime::now(), false));
        assert!(!reader.has_unread());
    }

    #[test]
    fn send_time_discards_stale_samples() {
        let topic = Topic::new("send-time").expect("topic");
        let reader = reader(
            &topic,
            ElementConfig::default().discard_policy(DiscardPolicy::SendTime),
        );
        let element = reader.element();
        let now = SystemTime::now();

        let newer = Sample::new(writer_id(1), 1, Key::from("k"), SampleEvent::Add, b"new".to_vec(), now);
        let older = Sample::new(
            writer_id(2),
            1,
            Key::from("k"),
            SampleEvent::Update,
            b"old".to_vec(),
            now - Duration::from_secs(1),
        );
        assert!(element.queue(newer, PeerId(1), now, false));
        assert!(!element.queue(older, PeerId(2), now, false));
    }

    #[test]
    fn instance_count_tracks_add_and_remove() {
        let topic = Topic::new("instances").expect("topic");
        let reader = reader(&topic, ElementConfig::default());
        let element = reader.element();
        let now = SystemTime::now();

        element.queue(sample(1, 1, "k", SampleEvent::Add, "a"), PeerId(1), now, false);
        element.queue(sample(2, 1, "k", SampleEvent::Add, "b"), PeerId(2), now, false);
        assert_eq!(reader.instance_count(), 2);

        element.queue(sample(1, 2, "k", SampleEvent::Remove, ""), PeerId(1), now, false);
        assert_eq!(reader.instance_count(), 1);
    }

    #[test]
    fn init_samples_report_batch_once() {
        let topic = Topic::new("init").expect("topic");
        let reader = reader(&topic, ElementConfig::default());
        let batches = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&batches);
        reader.on_init(move |samples| seen.lock().push(samples.len()));

        let from = RemoteElement { topic: 1, element: 1 };
        let samples = vec![
            sample(1, 1, "k", SampleEvent::Add, "a"),
            sample(1, 2, "k", SampleEvent::Update, "b"),
            sample(1, 2, "k", SampleEvent::Update, "b"),
        ];
        assert_eq!(reader.element().init_samples(PeerId(1), &from, samples, SystemTime::now()), 2);
        topic.flush_callbacks();

        assert_eq!(*batches.lock(), vec![2]);
    }

    #[test]
    fn released_writer_leaves_no_bookkeeping() {
        let topic = Topic::new("release").expect("topic");
        let reader = topic
            .reader()
            .filter(crate::Filter::key_prefix("k"))
            .build()
            .expect("reader");
        let element = reader.element();
        let now = SystemTime::now();

        for peer in 1..=3 {
            element.queue(sample(peer, 1, "k1", SampleEvent::Add, "a"), PeerId(peer), now, false);
            element.queue(sample(peer, 1, "k2", SampleEvent::Add, "b"), PeerId(peer), now, false);
        }
        assert_eq!(element.state.lock().reader.tracked_streams(), 6);

        let gone = RemoteElement { topic: 1, element: 1 };
        let subscriber = crate::session::AttachRequest {
            from: gone,
            subscriber_id: 1,
            binding: crate::session::Binding::Key(Key::from("k1")),
            sample_filter: None,
            priority: 0,
        };
        let session: Arc<dyn crate::session::Session> = crate::session::LocalSession::loopback(
            PeerId(2),
            Arc::new(crate::session::ForwarderRegistry::new()),
        );
        assert!(element.attach_key(&session, subscriber));
        assert!(element.detach_element(PeerId(2), &gone));

        let state = element.state.lock();
        assert_eq!(state.reader.tracked_streams(), 4);
        assert_eq!(state.reader.instance_count(), 4);
        assert_eq!(state.reader.last_stamps.len(), 2);
    }

    #[test]
    fn writer_elements_ignore_queue() {
        let topic = Topic::new("not-a-reader").expect("topic");
        let writer = topic.writer().key("k").build().expect("writer");

        assert!(!writer
            .element()
            .queue(sample(1, 1, "k", SampleEvent::Add, "a"), PeerId(1), SystemTime::now(), false));
    }
}
