// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key and sample filters.
//!
//! A filter is a named predicate plus the encoded criteria it was built
//! from. Filters are exchanged between peers by (name, criteria), so two
//! filters compare equal exactly when both match.
//!
//! # Example
//!
//! ```
//! use keyflow::{Filter, Key, SampleEvent};
//!
//! let sensors = Filter::key_glob("sensor/*/temp");
//! assert!(sensors.match_key(&Key::from("sensor/7/temp")));
//! assert!(!sensors.match_key(&Key::from("actuator/7")));
//!
//! let removals = Filter::sample_events(&[SampleEvent::Remove]);
//! assert_eq!(removals.target(), keyflow::FilterTarget::Sample);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{Key, Sample, SampleEvent};

type KeyPredicate = dyn Fn(&Key) -> bool + Send + Sync;
type SamplePredicate = dyn Fn(&Sample) -> bool + Send + Sync;

/// What a filter is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// Evaluated against keys (dynamic key attachment).
    Key,
    /// Evaluated against whole samples (content filtering).
    Sample,
}

#[derive(Clone)]
enum Predicate {
    Key(Arc<KeyPredicate>),
    Sample(Arc<SamplePredicate>),
}

/// Shared, immutable key or sample predicate.
#[derive(Clone)]
pub struct Filter {
    name: Arc<str>,
    criteria: Arc<[u8]>,
    predicate: Predicate,
}

impl Filter {
    /// Keys starting with `prefix`.
    pub fn key_prefix(prefix: &str) -> Self {
        let wanted = prefix.as_bytes().to_vec();
        let criteria = wanted.clone();
        Self::custom_key("key-prefix", criteria, move |key| {
            key.as_bytes().starts_with(&wanted)
        })
    }

    /// Keys matching a glob pattern (`*` any run, `?` one byte).
    pub fn key_glob(pattern: &str) -> Self {
        let wanted = pattern.as_bytes().to_vec();
        let criteria = wanted.clone();
        Self::custom_key("key-glob", criteria, move |key| {
            glob_match(&wanted, key.as_bytes())
        })
    }

    /// Samples whose event is one of `events`.
    pub fn sample_events(events: &[SampleEvent]) -> Self {
        let mut wanted: Vec<SampleEvent> = events.to_vec();
        wanted.sort();
        wanted.dedup();
        let criteria: Vec<u8> = wanted.iter().map(|e| *e as u8).collect();
        Self::custom_sample("sample-events", criteria, move |sample| {
            wanted.contains(&sample.event())
        })
    }

    /// Application-defined key filter.
    pub fn custom_key<F>(name: &str, criteria: impl Into<Vec<u8>>, predicate: F) -> Self
    where
        F: Fn(&Key) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            criteria: Arc::from(criteria.into()),
            predicate: Predicate::Key(Arc::new(predicate)),
        }
    }

    /// Application-defined sample filter.
    pub fn custom_sample<F>(name: &str, criteria: impl Into<Vec<u8>>, predicate: F) -> Self
    where
        F: Fn(&Sample) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            criteria: Arc::from(criteria.into()),
            predicate: Predicate::Sample(Arc::new(predicate)),
        }
    }

    /// Filter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded criteria.
    pub fn criteria(&self) -> &[u8] {
        &self.criteria
    }

    /// Whether this filter applies to keys or to samples.
    pub fn target(&self) -> FilterTarget {
        match self.predicate {
            Predicate::Key(_) => FilterTarget::Key,
            Predicate::Sample(_) => FilterTarget::Sample,
        }
    }

    /// Evaluate against a key. Sample filters never restrict keys.
    pub fn match_key(&self, key: &Key) -> bool {
        match &self.predicate {
            Predicate::Key(p) => p(key),
            Predicate::Sample(_) => true,
        }
    }

    /// Evaluate against a sample. Key filters test the sample's key.
    pub fn match_sample(&self, sample: &Sample) -> bool {
        match &self.predicate {
            Predicate::Key(p) => p(sample.key()),
            Predicate::Sample(p) => p(sample),
        }
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.criteria == other.criteria
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.criteria.hash(state);
    }
}

impl PartialOrd for Filter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Filter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.criteria.cmp(&other.criteria))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("criteria", &String::from_utf8_lossy(&self.criteria))
            .field("target", &self.target())
            .finish()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, String::from_utf8_lossy(&self.criteria))
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Backtrack point: position after the last '*' and the text index it matched from.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p + 1, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WriterId;
    use crate::session::PeerId;
    use std::time::SystemTime;

    fn sample(event: SampleEvent) -> Sample {
        let origin = WriterId {
            peer: PeerId(1),
            topic: 1,
            element: 1,
        };
        Sample::new(origin, 1, Key::from("k"), event, Vec::new(), SystemTime::now())
    }

    #[test]
    fn glob_patterns() {
        assert!(glob_match(b"foo*", b"fooa"));
        assert!(glob_match(b"f?o?", b"fooe"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"a*b*c", b"axxbyyc"));
        assert!(!glob_match(b"a*b*c", b"axxbyy"));
        assert!(!glob_match(b"foo", b"foob"));
    }

    #[test]
    fn prefix_filter_matches_keys() {
        let filter = Filter::key_prefix("foo");
        assert_eq!(filter.target(), FilterTarget::Key);
        assert!(filter.match_key(&Key::from("fooc")));
        assert!(!filter.match_key(&Key::from("bar")));
    }

    #[test]
    fn event_filter_matches_samples_only() {
        let filter = Filter::sample_events(&[SampleEvent::Add, SampleEvent::Remove]);
        assert!(filter.match_key(&Key::from("anything")));
        assert!(filter.match_sample(&sample(SampleEvent::Remove)));
        assert!(!filter.match_sample(&sample(SampleEvent::Update)));
    }

    #[test]
    fn equality_uses_name_and_criteria() {
        assert_eq!(Filter::key_prefix("a"), Filter::key_prefix("a"));
        assert_ne!(Filter::key_prefix("a"), Filter::key_glob("a"));
        assert_eq!(
            Filter::sample_events(&[SampleEvent::Remove, SampleEvent::Add]),
            Filter::sample_events(&[SampleEvent::Add, SampleEvent::Remove])
        );
    }
}
