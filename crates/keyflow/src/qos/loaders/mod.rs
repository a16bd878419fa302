// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Element configuration loaders.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyflow::qos::loaders::YamlLoader;
//!
//! let config = YamlLoader::load_config("elements.yaml", Some("sensor_history"))?;
//! let reader = topic.reader().key("temp/1").config(config).build()?;
//! ```

pub mod yaml;

pub use yaml::{YamlConfigDocument, YamlElementProfile, YamlLoader};
