// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer arbitration.
//!
//! When several writers publish the same key, a reader only accepts samples
//! from the top-ranked one: highest priority first, then lowest [`WriterId`].
//! The ranking is recomputed on every attach and detach touching the key and
//! never affects other keys.
//!
//! # Examples
//!
//! ```
//! use keyflow::qos::PriorityRanking;
//! use keyflow::{Key, WriterId};
//! use keyflow::session::PeerId;
//!
//! let low = WriterId { peer: PeerId(1), topic: 1, element: 1 };
//! let high = WriterId { peer: PeerId(2), topic: 1, element: 1 };
//! let key = Key::from("pump");
//!
//! let mut ranking = PriorityRanking::new();
//! ranking.insert(&key, low, 0);
//! ranking.insert(&key, high, 10);
//!
//! assert!(ranking.accepts(&key, high));
//! assert!(!ranking.accepts(&key, low));
//!
//! ranking.remove(&key, high);
//! assert!(ranking.accepts(&key, low));
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use crate::core::{Key, WriterId};

/// Rank order: descending priority, then ascending writer id.
type Contender = (Reverse<i32>, WriterId);

/// Per-key ranking of competing writers.
#[derive(Debug, Default)]
pub struct PriorityRanking {
    keys: HashMap<Key, BTreeSet<Contender>>,
}

impl PriorityRanking {
    /// Empty ranking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `writer` as a contender for `key`.
    ///
    /// Re-inserting with a different priority replaces the previous entry.
    /// Returns `true` if the top-ranked writer of `key` changed.
    pub fn insert(&mut self, key: &Key, writer: WriterId, priority: i32) -> bool {
        let contenders = self.keys.entry(key.clone()).or_default();
        let before = contenders.first().map(|c| c.1);
        contenders.retain(|c| c.1 != writer);
        contenders.insert((Reverse(priority), writer));
        before != contenders.first().map(|c| c.1)
    }

    /// Drop `writer` from the contenders of `key`.
    ///
    /// Returns `true` if the top-ranked writer of `key` changed.
    pub fn remove(&mut self, key: &Key, writer: WriterId) -> bool {
        let Some(contenders) = self.keys.get_mut(key) else {
            return false;
        };
        let before = contenders.first().map(|c| c.1);
        contenders.retain(|c| c.1 != writer);
        let after = contenders.first().map(|c| c.1);
        if contenders.is_empty() {
            self.keys.remove(key);
        }
        before != after
    }

    /// Drop `writer` from every key. Returns the keys whose top writer changed.
    pub fn remove_writer(&mut self, writer: WriterId) -> Vec<Key> {
        let keys: Vec<Key> = self
            .keys
            .iter()
            .filter(|(_, c)| c.iter().any(|(_, w)| *w == writer))
            .map(|(k, _)| k.clone())
            .collect();

        keys.into_iter()
            .filter(|key| self.remove(key, writer))
            .collect()
    }

    /// Top-ranked writer of `key`.
    pub fn top(&self, key: &Key) -> Option<WriterId> {
        self.keys.get(key).and_then(|c| c.first()).map(|c| c.1)
    }

    /// Whether a sample of `writer` on `key` is accepted.
    ///
    /// Keys without known contenders accept every writer.
    pub fn accepts(&self, key: &Key, writer: WriterId) -> bool {
        match self.top(key) {
            Some(top) => top == writer,
            None => true,
        }
    }

    /// Number of contenders for `key`.
    pub fn contenders(&self, key: &Key) -> usize {
        self.keys.get(key).map_or(0, BTreeSet::len)
    }

    /// Distinct writers across all keys.
    pub fn writer_count(&self) -> usize {
        let mut writers: Vec<WriterId> = self
            .keys
            .values()
            .flat_map(|c| c.iter().map(|(_, w)| *w))
            .collect();
        writers.sort();
        writers.dedup();
        writers.len()
    }

    /// Whether no key has contenders.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PeerId;

    fn writer(peer: u64) -> WriterId {
        WriterId {
            peer: PeerId(peer),
            topic: 1,
            element: 1,
        }
    }

    #[test]
    fn first_writer_is_accepted() {
        let key = Key::from("k");
        let mut ranking = PriorityRanking::new();
        assert!(ranking.accepts(&key, writer(7)));

        assert!(ranking.insert(&key, writer(7), 0));
        assert_eq!(ranking.top(&key), Some(writer(7)));
    }

    #[test]
    fn higher_priority_takes_over_and_falls_back() {
        let key = Key::from("k");
        let mut ranking = PriorityRanking::new();
        ranking.insert(&key, writer(1), 1);
        assert!(ranking.insert(&key, writer(2), 5));
        assert!(!ranking.accepts(&key, writer(1)));

        assert!(ranking.remove(&key, writer(2)));
        assert!(ranking.accepts(&key, writer(1)));
    }

    #[test]
    fn equal_priority_breaks_ties_on_writer_id() {
        let key = Key::from("k");
        let mut ranking = PriorityRanking::new();
        ranking.insert(&key, writer(9), 3);
        ranking.insert(&key, writer(4), 3);
        assert_eq!(ranking.top(&key), Some(writer(4)));
    }

    #[test]
    fn negative_priorities_rank_below_zero() {
        let key = Key::from("k");
        let mut ranking = PriorityRanking::new();
        ranking.insert(&key, writer(1), -10);
        ranking.insert(&key, writer(2), 0);
        assert_eq!(ranking.top(&key), Some(writer(2)));
    }

    #[test]
    fn other_keys_are_unaffected() {
        let (a, b) = (Key::from("a"), Key::from("b"));
        let mut ranking = PriorityRanking::new();
        ranking.insert(&a, writer(1), 0);
        ranking.insert(&a, writer(2), 9);
        ranking.insert(&b, writer(1), 0);

        assert_eq!(ranking.top(&b), Some(writer(1)));
        assert_eq!(ranking.remove_writer(writer(2)), vec![a.clone()]);
        assert_eq!(ranking.top(&a), Some(writer(1)));
        assert_eq!(ranking.writer_count(), 1);
    }

    #[test]
    fn ranking_is_independent_of_arrival_order() {
        let key = Key::from("k");
        let mut entries: Vec<(WriterId, i32)> =
            (1..=12).map(|p| (writer(p), (p % 4) as i32)).collect();

        let mut tops = Vec::new();
        for _ in 0..8 {
            fastrand::shuffle(&mut entries);
            let mut ranking = PriorityRanking::new();
            for (w, prio) in &entries {
                ranking.insert(&key, *w, *prio);
            }
            tops.push(ranking.top(&key));
        }

        // priority 3 goes to peers 3, 7, 11; the lowest id wins.
        assert!(tops.iter().all(|t| *t == Some(writer(3))));
    }
}
