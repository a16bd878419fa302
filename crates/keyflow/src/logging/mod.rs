// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `log` backend with console and file outputs.
//!
//! The library logs through the `log` facade. Applications that do not bring
//! their own backend can install this one:
//!
//! ```no_run
//! use keyflow::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);
//! log::info!("ready");
//! ```
//!
//! Protocol detail is logged at debug level and gated per element by
//! [`TraceLevels`](crate::TraceLevels); delivery failures and callback panics
//! are logged as warnings.

pub mod logger;
mod output;

pub use logger::{flush_logger, init_logger};
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};
