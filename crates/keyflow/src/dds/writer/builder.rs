// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builder for DataWriter configuration.

use super::runtime::DataWriter;
use crate::core::Key;
use crate::dds::Topic;
use crate::engine::ElementKind;
use crate::error::{Error, Result};
use crate::qos::ElementConfig;

pub struct WriterBuilder<'a> {
    pub(super) topic: &'a Topic,
    pub(super) keys: Vec<Key>,
    pub(super) config: ElementConfig,
}

impl<'a> WriterBuilder<'a> {
    pub(crate) fn new(topic: &'a Topic) -> Self {
        Self {
            topic,
            keys: Vec::new(),
            config: ElementConfig::default(),
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn keys<K: Into<Key>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Element overrides, merged over the topic's writer defaults.
    pub fn config(mut self, config: ElementConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for `config(config.priority(priority))`.
    pub fn priority(mut self, priority: i32) -> Self {
        self.config = self.config.priority(priority);
        self
    }

    pub fn build(self) -> Result<DataWriter> {
        if self.keys.is_empty() {
            return Err(Error::InvalidConfig(
                "a writer needs at least one key".to_string(),
            ));
        }
        let config = self.config.merged_over(&self.topic.writer_defaults());
        let element = self
            .topic
            .create_element(ElementKind::KeyWriter { keys: self.keys }, config, None)?;
        Ok(DataWriter::new(element))
    }
}
