// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retention policies, element configuration and writer arbitration.
//!
//! - [`history`] - clear-history and discard policy enums
//! - [`config`] - `ElementConfig` builder and validation into a [`RetentionPolicy`]
//! - [`retention`] - the retention engine (clear -> cap -> lifetime)
//! - [`arbitration`] - per-key ranking of competing writers

pub mod arbitration;
pub mod config;
pub mod history;
pub mod retention;

#[cfg(feature = "config-loaders")]
pub mod loaders;

pub use arbitration::PriorityRanking;
pub use config::{ElementConfig, ElementRole, RetentionPolicy, TraceLevels, LAST_INSTANCE};
pub use history::{ClearHistoryPolicy, DiscardPolicy};
