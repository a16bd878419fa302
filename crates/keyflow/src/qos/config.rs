// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Element configuration.
//!
//! [`ElementConfig`] is a sparse set of overrides: unset fields fall back to
//! the topic defaults, then to the role defaults. Validation happens when the
//! configuration is applied (element creation or `Topic::set_*_defaults`) and
//! produces a [`RetentionPolicy`]. Out-of-range values are rejected, never
//! clamped.
//!
//! # Examples
//!
//! ```
//! use keyflow::qos::{ClearHistoryPolicy, ElementConfig, ElementRole};
//! use std::time::Duration;
//!
//! let config = ElementConfig::default()
//!     .clear_history(ClearHistoryPolicy::Never)
//!     .sample_count(4)
//!     .sample_lifetime(Duration::from_millis(200));
//!
//! let policy = config.retention_policy(ElementRole::Writer)?;
//! assert_eq!(policy.max_count, Some(4));
//! # Ok::<(), keyflow::Error>(())
//! ```

use std::time::Duration;

use super::history::{ClearHistoryPolicy, DiscardPolicy};
use crate::error::{Error, Result};

/// `sample_count` sentinel: retain only the current key instance.
///
/// Implemented as [`ClearHistoryPolicy::OnAdd`], not as a numeric cap.
pub const LAST_INSTANCE: i32 = -1;

/// Highest accepted trace level.
const MAX_TRACE_LEVEL: u8 = 3;

/// Which side of the data flow an element sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    /// Reader: retention applies to the unread queue. Default clear policy `Never`.
    Reader,
    /// Writer: retention applies to the backfill history. Default clear policy `OnAll`.
    Writer,
}

impl ElementRole {
    fn default_clear_history(self) -> ClearHistoryPolicy {
        match self {
            ElementRole::Reader => ClearHistoryPolicy::Never,
            ElementRole::Writer => ClearHistoryPolicy::OnAll,
        }
    }
}

/// Sparse element configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementConfig {
    /// Retained sample cap: `> 0` caps, `0` is unlimited, [`LAST_INSTANCE`]
    /// keeps the current key instance.
    pub sample_count: Option<i32>,
    /// Retained sample lifetime in milliseconds; `0` disables pruning.
    pub sample_lifetime_ms: Option<i64>,
    /// History clearing policy.
    pub clear_history: Option<ClearHistoryPolicy>,
    /// Reader discard policy.
    pub discard_policy: Option<DiscardPolicy>,
    /// Writer priority used by reader-side arbitration (higher wins).
    pub priority: Option<i32>,
    /// Lifetime given to [`sample_lifetime`](Self::sample_lifetime) that does
    /// not fit in `sample_lifetime_ms`; rejected by `validate`.
    oversized_lifetime: Option<Duration>,
}

impl ElementConfig {
    /// Set the retained sample cap.
    pub fn sample_count(mut self, count: i32) -> Self {
        self.sample_count = Some(count);
        self
    }

    /// Retain only the current key instance.
    pub fn keep_last_instance(mut self) -> Self {
        self.sample_count = Some(LAST_INSTANCE);
        self
    }

    /// Set the sample lifetime in milliseconds.
    pub fn sample_lifetime_ms(mut self, ms: i64) -> Self {
        self.sample_lifetime_ms = Some(ms);
        self.oversized_lifetime = None;
        self
    }

    /// Set the sample lifetime. A lifetime beyond `i64::MAX` milliseconds
    /// makes the configuration invalid.
    pub fn sample_lifetime(mut self, lifetime: Duration) -> Self {
        match i64::try_from(lifetime.as_millis()) {
            Ok(ms) => {
                self.sample_lifetime_ms = Some(ms);
                self.oversized_lifetime = None;
            }
            Err(_) => {
                self.sample_lifetime_ms = None;
                self.oversized_lifetime = Some(lifetime);
            }
        }
        self
    }

    /// Set the history clearing policy.
    pub fn clear_history(mut self, policy: ClearHistoryPolicy) -> Self {
        self.clear_history = Some(policy);
        self
    }

    /// Set the reader discard policy.
    pub fn discard_policy(mut self, policy: DiscardPolicy) -> Self {
        self.discard_policy = Some(policy);
        self
    }

    /// Set the writer priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Fields set in `self` win; unset fields are taken from `defaults`.
    #[must_use]
    pub fn merged_over(&self, defaults: &ElementConfig) -> ElementConfig {
        ElementConfig {
            sample_count: self.sample_count.or(defaults.sample_count),
            sample_lifetime_ms: self.sample_lifetime_ms.or(defaults.sample_lifetime_ms),
            clear_history: self.clear_history.or(defaults.clear_history),
            discard_policy: self.discard_policy.or(defaults.discard_policy),
            priority: self.priority.or(defaults.priority),
            oversized_lifetime: if self.sample_lifetime_ms.is_some() {
                self.oversized_lifetime
            } else {
                self.oversized_lifetime.or(defaults.oversized_lifetime)
            },
        }
    }

    /// Check ranges and combinations.
    pub fn validate(&self) -> Result<()> {
        if let Some(lifetime) = self.oversized_lifetime {
            return Err(Error::InvalidConfig(format!(
                "sample lifetime {:?} exceeds {} ms",
                lifetime,
                i64::MAX
            )));
        }

        if let Some(count) = self.sample_count {
            if count < LAST_INSTANCE {
                return Err(Error::InvalidConfig(format!(
                    "sample_count {} out of range (expected >= 0, or {} for last instance)",
                    count, LAST_INSTANCE
                )));
            }
        }

        if let Some(ms) = self.sample_lifetime_ms {
            if ms < 0 {
                return Err(Error::InvalidConfig(format!(
                    "sample_lifetime_ms {} is negative",
                    ms
                )));
            }
        }

        if self.sample_count == Some(LAST_INSTANCE) {
            if let Some(policy) = self.clear_history {
                if policy != ClearHistoryPolicy::OnAdd {
                    return Err(Error::InvalidConfig(format!(
                        "sample_count {} keeps the last instance and conflicts with clear_history {:?}",
                        LAST_INSTANCE, policy
                    )));
                }
            }
            if self.sample_lifetime_ms.is_some_and(|ms| ms > 0) {
                return Err(Error::InvalidConfig(format!(
                    "sample_count {} cannot be combined with a sample lifetime",
                    LAST_INSTANCE
                )));
            }
        }

        Ok(())
    }

    /// Validate and resolve into the policy the retention engine runs.
    pub fn retention_policy(&self, role: ElementRole) -> Result<RetentionPolicy> {
        self.validate()?;

        let keep_last_instance = self.sample_count == Some(LAST_INSTANCE);
        let clear_history = if keep_last_instance {
            ClearHistoryPolicy::OnAdd
        } else {
            self.clear_history
                .unwrap_or_else(|| role.default_clear_history())
        };

        let max_count = match self.sample_count {
            Some(count) if count > 0 => Some(count as usize),
            _ => None,
        };

        let lifetime = match self.sample_lifetime_ms {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
            _ => None,
        };

        Ok(RetentionPolicy {
            clear_history,
            max_count,
            lifetime,
            discard: self.discard_policy.unwrap_or_default(),
        })
    }
}

/// Validated retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Rule 1: history clearing.
    pub clear_history: ClearHistoryPolicy,
    /// Rule 2: per-key cap, `None` = unlimited.
    pub max_count: Option<usize>,
    /// Rule 3: lifetime, `None` = samples never age out.
    pub lifetime: Option<Duration>,
    /// Reader-side discard policy.
    pub discard: DiscardPolicy,
}

impl RetentionPolicy {
    /// Keep every sample.
    pub fn keep_all() -> Self {
        Self {
            clear_history: ClearHistoryPolicy::Never,
            max_count: None,
            lifetime: None,
            discard: DiscardPolicy::None,
        }
    }

    /// Same policy with a different clearing rule.
    #[must_use]
    pub fn with_clear_history(mut self, policy: ClearHistoryPolicy) -> Self {
        self.clear_history = policy;
        self
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::keep_all()
    }
}

/// Per-category log verbosity (0 = silent, 3 = every message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceLevels {
    /// Element creation and destruction.
    pub topic: u8,
    /// Sample publication, queueing and retention.
    pub data: u8,
    /// Attach, detach and forwarding.
    pub session: u8,
}

impl TraceLevels {
    /// Every category at the highest level.
    pub fn verbose() -> Self {
        Self {
            topic: MAX_TRACE_LEVEL,
            data: MAX_TRACE_LEVEL,
            session: MAX_TRACE_LEVEL,
        }
    }

    /// Reject levels above the highest one.
    pub fn validate(&self) -> Result<()> {
        for (name, level) in [
            ("topic", self.topic),
            ("data", self.data),
            ("session", self.session),
        ] {
            if level > MAX_TRACE_LEVEL {
                return Err(Error::InvalidConfig(format!(
                    "trace level {} for '{}' exceeds {}",
                    level, name, MAX_TRACE_LEVEL
                )));
            }
        }
        Ok(())
    }
}
