// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log output backends (console and file).

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Protocol detail (attach/detach, queue, retention), gated by `TraceLevels`.
    Debug = 0,
    /// Informational messages from the host application.
    Info = 1,
    /// Delivery failures and swallowed callback panics.
    Warning = 2,
    /// Failures of the logging backend itself.
    Error = 3,
}

impl LogLevel {
    /// Fixed-width label used as the line prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }

    /// `log` filter letting through this level and above.
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Debug => log::LevelFilter::Trace,
            Self::Info => log::LevelFilter::Info,
            Self::Warning => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warning,
            log::Level::Error => Self::Error,
        }
    }
}

/// Destination of formatted log lines.
///
/// # Example
///
/// ```rust
/// use keyflow::logging::{ConsoleOutput, LogLevel, Output};
///
/// let console = ConsoleOutput::new(LogLevel::Warning);
/// console.write(LogLevel::Debug, "keyflow::engine", "filtered out").unwrap();
/// console.flush().unwrap();
/// ```
pub trait Output: Send + Sync {
    /// Write one line for `message` logged under `target`. Lines below the
    /// output's level are skipped without error.
    fn write(&self, level: LogLevel, target: &str, message: &str) -> io::Result<()>;

    /// Push buffered lines to the destination.
    fn flush(&self) -> io::Result<()>;
}

fn format_line(level: LogLevel, target: &str, message: &str) -> String {
    format!("[{}] {}: {}\n", level.as_str(), target, message)
}

/// Writes to stderr.
pub struct ConsoleOutput {
    level_filter: Mutex<LogLevel>,
}

impl ConsoleOutput {
    /// Console output writing `level_filter` and above.
    pub fn new(level_filter: LogLevel) -> Self {
        Self {
            level_filter: Mutex::new(level_filter),
        }
    }

    /// Change the minimum level this output writes.
    pub fn set_level(&self, level: LogLevel) {
        *self.level_filter.lock() = level;
    }
}

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, target: &str, message: &str) -> io::Result<()> {
        if level < *self.level_filter.lock() {
            return Ok(());
        }
        io::stderr().write_all(format_line(level, target, message).as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Appends to a file, truncated on creation.
pub struct FileOutput {
    file: Mutex<File>,
    level_filter: Mutex<LogLevel>,
}

impl FileOutput {
    /// Create or truncate `path` and write `level_filter` and above to it.
    ///
    /// Fails if the file cannot be opened for writing.
    pub fn new(path: impl AsRef<Path>, level_filter: LogLevel) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            level_filter: Mutex::new(level_filter),
        })
    }

    /// Change the minimum level this output writes.
    pub fn set_level(&self, level: LogLevel) {
        *self.level_filter.lock() = level;
    }
}

impl Output for FileOutput {
    fn write(&self, level: LogLevel, target: &str, message: &str) -> io::Result<()> {
        if level < *self.level_filter.lock() {
            return Ok(());
        }
        self.file
            .lock()
            .write_all(format_line(level, target, message).as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Debug);
    }

    #[test]
    fn test_file_output_level_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keyflow.log");
        let output = FileOutput::new(&path, LogLevel::Warning).expect("create log file");

        output.write(LogLevel::Debug, "keyflow::engine", "hidden").expect("write");
        output.write(LogLevel::Warning, "keyflow::engine", "shown").expect("write");
        output.flush().expect("flush");

        let content = std::fs::read_to_string(&path).expect("read log file");
        assert_eq!(content, "[WARN ] keyflow::engine: shown\n");

        output.set_level(LogLevel::Debug);
        output.write(LogLevel::Debug, "keyflow::engine", "now shown").expect("write");
        output.flush().expect("flush");
        assert!(std::fs::read_to_string(&path).expect("read").contains("now shown"));
    }
}
