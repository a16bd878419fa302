// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builder for DataReader configuration.
//!
//! A reader is either bound to a key set (key reader) or to a key filter
//! (filtered reader). Element overrides are merged over the topic's reader
//! defaults before validation.

use super::runtime::DataReader;
use crate::core::{Filter, Key};
use crate::dds::Topic;
use crate::engine::ElementKind;
use crate::error::{Error, Result};
use crate::qos::ElementConfig;

pub struct ReaderBuilder<'a> {
    pub(super) topic: &'a Topic,
    pub(super) keys: Vec<Key>,
    pub(super) filter: Option<Filter>,
    pub(super) sample_filter: Option<Filter>,
    pub(super) config: ElementConfig,
}

impl<'a> ReaderBuilder<'a> {
    pub(crate) fn new(topic: &'a Topic) -> Self {
        Self {
            topic,
            keys: Vec::new(),
            filter: None,
            sample_filter: None,
            config: ElementConfig::default(),
        }
    }

    /// Read `key`.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Read every key of `keys`.
    pub fn keys<K: Into<Key>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Read every key `filter` accepts. Exclusive with [`key`](Self::key).
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Only receive samples `filter` accepts. Writers apply it before sending.
    pub fn sample_filter(mut self, filter: Filter) -> Self {
        self.sample_filter = Some(filter);
        self
    }

    /// Element overrides, merged over the topic's reader defaults.
    pub fn config(mut self, config: ElementConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<DataReader> {
        let ReaderBuilder {
            topic,
            keys,
            filter,
            sample_filter,
            config,
        } = self;

        let kind = match (keys.is_empty(), filter) {
            (false, None) => ElementKind::KeyReader { keys },
            (true, Some(filter)) => ElementKind::FilteredReader { filter },
            (false, Some(_)) => {
                return Err(Error::InvalidConfig(
                    "a reader takes either keys or a key filter, not both".to_string(),
                ))
            }
            (true, None) => {
                return Err(Error::InvalidConfig(
                    "a reader needs at least one key or a key filter".to_string(),
                ))
            }
        };

        let config = config.merged_over(&topic.reader_defaults());
        let element = topic.create_element(kind, config, sample_filter)?;
        Ok(DataReader::new(element))
    }
}
