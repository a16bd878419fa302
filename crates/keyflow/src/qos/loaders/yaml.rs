// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML element profile loader.
//!
//! # Example YAML
//!
//! ```yaml
//! default_profile: latest_only
//!
//! profiles:
//!   latest_only:
//!     sample_count: -1
//!
//!   sensor_history:
//!     clear_history: NEVER
//!     sample_count: 32
//!     sample_lifetime_ms: 5000
//!     discard_policy: SEND_TIME
//!
//!   primary_writer:
//!     clear_history: ON_ALL
//!     priority: 10
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};
use crate::qos::{ClearHistoryPolicy, DiscardPolicy, ElementConfig};

/// YAML element profile loader.
pub struct YamlLoader;

/// Root YAML document.
#[derive(Debug, Deserialize)]
pub struct YamlConfigDocument {
    /// Named element profiles.
    #[serde(default)]
    pub profiles: HashMap<String, YamlElementProfile>,

    /// Profile used when none is named.
    #[serde(default)]
    pub default_profile: Option<String>,
}

/// One element profile.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct YamlElementProfile {
    /// NEVER, ON_ADD, ON_REMOVE, ON_ALL or ON_ALL_EXCEPT_PARTIAL_UPDATE
    pub clear_history: Option<String>,

    /// Retained sample cap, 0 for unlimited, -1 for the last instance only
    pub sample_count: Option<i32>,

    /// Sample lifetime in milliseconds, 0 to disable
    pub sample_lifetime_ms: Option<i64>,

    /// NONE or SEND_TIME
    pub discard_policy: Option<String>,

    /// Writer priority
    pub priority: Option<i32>,
}

impl YamlLoader {
    /// Read and parse a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<YamlConfigDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ConfigFileNotFound(path.display().to_string()),
            _ => Error::IoError(e),
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse YAML content.
    pub fn parse_yaml(content: &str) -> Result<YamlConfigDocument> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve a named profile.
    pub fn get_profile(doc: &YamlConfigDocument, name: &str) -> Result<ElementConfig> {
        let profile = doc
            .profiles
            .get(name)
            .ok_or_else(|| Error::InvalidConfig(format!("profile '{}' not found", name)))?;
        Self::profile_to_config(profile)
    }

    /// Resolve the default profile, or an empty configuration if the
    /// document names none.
    pub fn get_default_profile(doc: &YamlConfigDocument) -> Result<ElementConfig> {
        match doc.default_profile {
            Some(ref name) => Self::get_profile(doc, name),
            None => Ok(ElementConfig::default()),
        }
    }

    /// Resolve every profile of the document.
    pub fn all_profiles(doc: &YamlConfigDocument) -> Result<HashMap<String, ElementConfig>> {
        doc.profiles
            .iter()
            .map(|(name, profile)| Ok((name.clone(), Self::profile_to_config(profile)?)))
            .collect()
    }

    /// Convert and validate a profile.
    pub fn profile_to_config(profile: &YamlElementProfile) -> Result<ElementConfig> {
        let mut config = ElementConfig::default();

        if let Some(ref name) = profile.clear_history {
            let policy = ClearHistoryPolicy::from_name(name)
                .ok_or_else(|| Error::InvalidConfig(format!("invalid clear_history: {}", name)))?;
            config = config.clear_history(policy);
        }

        if let Some(ref name) = profile.discard_policy {
            let policy = DiscardPolicy::from_name(name)
                .ok_or_else(|| Error::InvalidConfig(format!("invalid discard_policy: {}", name)))?;
            config = config.discard_policy(policy);
        }

        config.sample_count = profile.sample_count;
        config.sample_lifetime_ms = profile.sample_lifetime_ms;
        config.priority = profile.priority;

        config.validate()?;
        Ok(config)
    }

    /// Load one profile straight from a file; `None` picks the default profile.
    pub fn load_config<P: AsRef<Path>>(path: P, profile_name: Option<&str>) -> Result<ElementConfig> {
        let doc = Self::load_from_file(path)?;
        match profile_name {
            Some(name) => Self::get_profile(&doc, name),
            None => Self::get_default_profile(&doc),
        }
    }
}
