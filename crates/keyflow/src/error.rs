// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by keyflow operations.
//!
//! Only local callers see these. Anomalies in peer-originated calls (stale
//! forwards, duplicate attaches, detaches of absent keys) are absorbed by the
//! element and logged, never turned into an `Error`.

/// Errors returned by keyflow operations.
///
/// # Example
///
/// ```rust
/// use keyflow::{ElementConfig, Error};
///
/// let config = ElementConfig::default().sample_lifetime_ms(-5);
/// match config.validate() {
///     Err(Error::InvalidConfig(msg)) => println!("rejected: {}", msg),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Retention or element configuration is out of range.
    InvalidConfig(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),
    /// Configuration document could not be parsed.
    ConfigParse(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The element was destroyed before or during the operation.
    ElementDestroyed,
    /// A blocking wait ran out of time.
    Timeout,

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// The writer does not publish the given key.
    UnknownKey(String),
    /// No updater registered on the topic under the given tag.
    UnknownUpdater(String),
    /// The event cannot be published through this call.
    UnsupportedEvent(String),

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// A session could not carry an envelope to its peer.
    DeliveryFailed(String),
    /// I/O error with underlying cause.
    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::ConfigParse(msg) => write!(f, "Config parse error: {}", msg),
            Error::ElementDestroyed => write!(f, "Element destroyed"),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::UnknownKey(key) => write!(f, "Key not published by this writer: {}", key),
            Error::UnknownUpdater(tag) => write!(f, "No updater registered for tag '{}'", tag),
            Error::UnsupportedEvent(msg) => write!(f, "Unsupported event: {}", msg),
            Error::DeliveryFailed(msg) => write!(f, "Delivery failed: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = std::result::Result<T, Error>;
