// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! User-facing API: [`Topic`], [`DataReader`], [`DataWriter`].
//!
//! ```text
//! Topic --reader()--> ReaderBuilder --build()--> DataReader
//!       --writer()--> WriterBuilder --build()--> DataWriter
//! ```
//!
//! Both handles wrap one [`DataElement`](crate::engine::DataElement) owned by
//! the topic's arena. Dropping a handle destroys its element; dropping the
//! topic destroys all of them.

pub mod reader;
pub mod topic;
pub mod writer;

pub use reader::{DataReader, ReaderBuilder};
pub use topic::{Topic, TopicBuilder};
pub use writer::{DataWriter, WriterBuilder};
