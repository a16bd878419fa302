// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # keyflow - key-partitioned publish/subscribe
//!
//! Topics map keys to values. Writers publish samples against keys, readers
//! attach to keys (or to key filters) and receive a history-bounded stream of
//! samples.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyflow::{Key, Topic, Result};
//!
//! fn main() -> Result<()> {
//!     let topic = Topic::new("sensors")?;
//!
//!     let writer = topic.writer().key("temp/1").build()?;
//!     let reader = topic.reader().key("temp/1").build()?;
//!
//!     writer.add(&Key::from("temp/1"), b"21.5".to_vec())?;
//!     let sample = reader.get_next_unread()?;
//!     assert_eq!(sample.value(), b"21.5");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |   Topic (element arena, updaters, default configs, local binding)   |
//! +---------------------------------------------------------------------+
//! |   DataReader / DataWriter  (thin handles over one DataElement)      |
//! +---------------------------------------------------------------------+
//! |   DataElement: attach/detach protocol | priority arbitration        |
//! |                listener registry     | waiters | callback executor  |
//! +---------------------------------------------------------------------+
//! |   Retention engine (clear -> cap -> lifetime), pure, no locking     |
//! +---------------------------------------------------------------------+
//! |   Session layer: Session trait, Envelope, ForwarderRegistry         |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`dds`] - Topic, DataReader, DataWriter (start here)
//! - [`qos`] - Retention policies, configuration, writer arbitration
//! - [`engine`] - Element core, listener registry, callback executor
//! - [`session`] - Transport-facing interface and facet forwarding
//! - [`core`] - Keys, filters, samples

/// Keys, filters and samples.
pub mod core;
/// Topic, DataReader and DataWriter.
pub mod dds;
/// Element core: listener registry, attach/detach protocol, executor.
pub mod engine;
/// Public error type.
pub mod error;
/// `log` backend with console and file outputs.
pub mod logging;
/// Retention policies, element configuration and writer arbitration.
pub mod qos;
/// Session abstraction and facet forwarding.
pub mod session;

pub use crate::core::{Filter, FilterTarget, Key, Sample, SampleEvent, WriterId};
pub use dds::{DataReader, DataWriter, ReaderBuilder, Topic, TopicBuilder, WriterBuilder};
pub use engine::{DataElement, ElementKind};
pub use error::{Error, Result};
pub use qos::{ClearHistoryPolicy, DiscardPolicy, ElementConfig, RetentionPolicy, TraceLevels};
pub use session::{Binding, Envelope, ForwarderRegistry, LocalSession, PeerId, Session};

/// Topic identifier, allocated by the owning node.
pub type TopicId = u64;

/// Element identifier, allocated by the owning topic.
pub type ElementId = u64;
