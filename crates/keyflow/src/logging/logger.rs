// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide `log` backend.

use super::output::{LogLevel, Output};
use std::io;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<&'static GlobalLogger> = OnceLock::new();

/// Backend installed with [`log::set_logger`].
pub struct GlobalLogger {
    output: Arc<dyn Output>,
    level_filter: LogLevel,
}

impl log::Log for GlobalLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        LogLevel::from(metadata.level()) >= self.level_filter
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        // Nowhere left to report a failing log sink.
        let _ = self
            .output
            .write(LogLevel::from(record.level()), record.target(), &message);
    }

    fn flush(&self) {
        let _ = self.output.flush();
    }
}

/// Install `output` as the `log` backend with minimum `level`.
///
/// Only the first call installs a backend; later calls, or a backend
/// installed by someone else, leave logging unchanged and return `false`.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) -> bool {
    let mut installed = false;
    LOGGER.get_or_init(|| {
        let logger: &'static GlobalLogger = Box::leak(Box::new(GlobalLogger {
            output,
            level_filter: level,
        }));
        if log::set_logger(logger).is_ok() {
            log::set_max_level(level.to_filter());
            installed = true;
        }
        logger
    });
    installed
}

/// Flush the installed output. No-op before [`init_logger`].
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.output.flush(),
        None => Ok(()),
    }
}
