// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retention engine.
//!
//! Pure functions over a retained window: no locking, no I/O, no clock. The
//! caller passes `now`, so a writer history and a reader queue fed the same
//! (event, timestamp) sequence under the same policy retain the same samples.
//!
//! Rules run in a fixed order on every insertion:
//!
//! 1. history clearing (drop the key's retained samples if the event triggers it)
//! 2. count capping (evict the key's oldest samples beyond `max_count`)
//! 3. lifetime pruning (evict samples stamped before `now - lifetime`)
//!
//! The window may hold several keys; rules 1 and 2 only touch samples of the
//! inserted sample's key.

use std::collections::VecDeque;
use std::time::SystemTime;

use super::config::RetentionPolicy;
use crate::core::{Key, Sample};

/// Insert `sample` into `window` and apply the policy.
///
/// Returns the number of samples evicted by the three rules.
pub fn insert(
    window: &mut VecDeque<Sample>,
    sample: Sample,
    policy: &RetentionPolicy,
    now: SystemTime,
) -> usize {
    let before = window.len();

    if policy.clear_history.clears_on(sample.event()) {
        let key = sample.key().clone();
        window.retain(|s| s.key() != &key);
    }

    let key = sample.key().clone();
    window.push_back(sample);

    if let Some(max) = policy.max_count {
        cap_key(window, &key, max);
    }

    prune_expired(window, policy, now);

    (before + 1).saturating_sub(window.len())
}

/// Drop every sample whose lifetime has elapsed at `now`.
///
/// Returns the number of evicted samples. No-op without a lifetime.
pub fn prune_expired(window: &mut VecDeque<Sample>, policy: &RetentionPolicy, now: SystemTime) -> usize {
    let Some(lifetime) = policy.lifetime else {
        return 0;
    };
    // A clock before the epoch-plus-lifetime cannot have expired anything.
    let Some(cutoff) = now.checked_sub(lifetime) else {
        return 0;
    };

    let before = window.len();
    window.retain(|s| s.timestamp() >= cutoff);
    before - window.len()
}

/// Samples retained for `key`, oldest first.
pub fn samples_for<'a>(window: &'a VecDeque<Sample>, key: &'a Key) -> impl Iterator<Item = &'a Sample> + 'a {
    window.iter().filter(move |s| s.key() == key)
}

fn cap_key(window: &mut VecDeque<Sample>, key: &Key, max: usize) {
    let count = window.iter().filter(|s| s.key() == key).count();
    if count <= max {
        return;
    }

    let mut excess = count - max;
    window.retain(|s| {
        if excess > 0 && s.key() == key {
            excess -= 1;
            false
        } else {
            true
        }
    });
}
