// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: intervals above zero, endpoint
//! URLs with the right scheme, a pepper whenever hashing is enabled.

use url::Url;

use crate::diagnostic::ConfigError;
use crate::model::{DomRelayConfig, RelayKind};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &DomRelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.client.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "client.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.client.log_level
        )));
    }

    if config.poll.interval_secs == 0 {
        errors.push(ConfigError::validation(
            "poll.interval_secs must be at least 1",
        ));
    }

    if config.poll.fallback_count == 0 {
        errors.push(ConfigError::validation(
            "poll.fallback_count must be at least 1",
        ));
    }

    for (i, marker) in config.identity.markers.iter().enumerate() {
        if marker.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "identity.markers[{i}] must not be blank"
            )));
        }
    }

    if config.identity.hash_senders
        && config
            .identity
            .pepper
            .as_deref()
            .is_none_or(|p| p.is_empty())
    {
        errors.push(ConfigError::validation(
            "identity.pepper is required when identity.hash_senders is enabled",
        ));
    }

    check_url(
        &mut errors,
        "browser.debugger_url",
        &config.browser.debugger_url,
        &["http", "https", "ws", "wss"],
    );

    if config.relay.kind == RelayKind::Websocket {
        check_url(&mut errors, "relay.url", &config.relay.url, &["ws", "wss"]);
    }

    if config.relay.reconnect_secs == 0 {
        errors.push(ConfigError::validation(
            "relay.reconnect_secs must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ConfigError>, key: &str, value: &str, schemes: &[&str]) {
    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ConfigError::validation(format!(
            "{key} must use one of the schemes {}, got `{}`",
            schemes.join(", "),
            url.scheme()
        ))),
        Err(e) => errors.push(ConfigError::validation(format!(
            "{key} `{value}` is not a valid URL: {e}"
        ))),
    }
}
