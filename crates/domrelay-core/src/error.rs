// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the domrelay messaging bridge.

use thiserror::Error;

/// The primary error type used across all domrelay adapter traits and core operations.
#[derive(Debug, Error)]
pub enum DomRelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A page snapshot could not be taken at all (script failed, page gone).
    ///
    /// Missing elements inside a single rendered message are not errors; the
    /// snapshot provider substitutes defaults for those.
    #[error("scrape error: {message}")]
    Scrape { message: String },

    /// Typing a message into the web UI failed.
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Browser automation errors (CDP connection, target lookup, evaluation).
    #[error("browser error: {message}")]
    Browser {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Event channel errors (connection failure, encoding, send failure).
    #[error("relay error: {message}")]
    Relay {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The relay's inbound command stream has ended and will yield nothing more.
    #[error("relay closed")]
    RelayClosed,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomRelayError {
    /// Shorthand for a [`DomRelayError::Scrape`] with the given message.
    pub fn scrape(message: impl Into<String>) -> Self {
        Self::Scrape {
            message: message.into(),
        }
    }

    /// Shorthand for a [`DomRelayError::Delivery`] without an underlying source.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`DomRelayError::Relay`] without an underlying source.
    pub fn relay(message: impl Into<String>) -> Self {
        Self::Relay {
            message: message.into(),
            source: None,
        }
    }
}
