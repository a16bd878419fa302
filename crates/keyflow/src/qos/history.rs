// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History clearing and discard policies.
//!
//! # Clear-history triggers
//!
//! | policy | Add | Update | PartialUpdate | Remove |
//! |---|---|---|---|---|
//! | `Never` | - | - | - | - |
//! | `OnAdd` | clear | - | - | - |
//! | `OnRemove` | - | - | - | clear |
//! | `OnAll` | clear | clear | clear | clear |
//! | `OnAllExceptPartialUpdate` | clear | clear | - | clear |

use crate::core::SampleEvent;

/// When the retained history of a key instance is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearHistoryPolicy {
    /// Keep everything (subject to count and lifetime).
    Never,
    /// Clear when a new instance starts.
    OnAdd,
    /// Clear when the instance is removed.
    OnRemove,
    /// Clear on every sample: only the latest sample is kept.
    OnAll,
    /// Like `OnAll`, but partial updates accumulate on top of the last full value.
    OnAllExceptPartialUpdate,
}

impl ClearHistoryPolicy {
    /// Whether a sample carrying `event` clears the retained history of its key.
    pub fn clears_on(self, event: SampleEvent) -> bool {
        match self {
            ClearHistoryPolicy::Never => false,
            ClearHistoryPolicy::OnAdd => event == SampleEvent::Add,
            ClearHistoryPolicy::OnRemove => event == SampleEvent::Remove,
            ClearHistoryPolicy::OnAll => true,
            ClearHistoryPolicy::OnAllExceptPartialUpdate => event != SampleEvent::PartialUpdate,
        }
    }

    /// Parse the upper-snake-case name used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NEVER" => Some(ClearHistoryPolicy::Never),
            "ON_ADD" => Some(ClearHistoryPolicy::OnAdd),
            "ON_REMOVE" => Some(ClearHistoryPolicy::OnRemove),
            "ON_ALL" => Some(ClearHistoryPolicy::OnAll),
            "ON_ALL_EXCEPT_PARTIAL_UPDATE" => Some(ClearHistoryPolicy::OnAllExceptPartialUpdate),
            _ => None,
        }
    }
}

/// Which incoming samples a reader discards before retention.
///
/// Writer arbitration (only the top-ranked writer of a key is accepted)
/// always applies and is not part of this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiscardPolicy {
    /// Accept every sample that passes dedup, filters and arbitration.
    #[default]
    None,
    /// Also drop samples stamped earlier than the last accepted sample of the
    /// same key.
    SendTime,
}

impl DiscardPolicy {
    /// Parse the upper-snake-case name used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Some(DiscardPolicy::None),
            "SEND_TIME" => Some(DiscardPolicy::SendTime),
            _ => None,
        }
    }
}
