// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core data model: keys, filters and samples.
//!
//! All three are immutable once built and cheap to clone (shared `Arc`
//! storage), so they can be handed across threads and kept in several
//! retention windows at once.

mod filter;
mod key;
mod sample;

pub use filter::{Filter, FilterTarget};
pub use key::Key;
pub use sample::{PartialUpdate, Sample, SampleEvent, WriterId};
