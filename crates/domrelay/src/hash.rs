// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `domrelay hash` command implementation.
//!
//! Lets the operator see which pseudonym the backend will receive for a
//! given sender, without starting the bridge.

use domrelay_config::DomRelayConfig;
use domrelay_core::DomRelayError;
use domrelay_detect::SenderHasher;
use secrecy::SecretString;

/// Hashes `name` with the configured pepper, whether or not hashing is
/// switched on for relaying.
pub fn run_hash(config: &DomRelayConfig, name: &str) -> Result<String, DomRelayError> {
    let pepper = config
        .identity
        .pepper
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DomRelayError::Config("identity.pepper is not set".into()))?;

    SenderHasher::new(SecretString::from(pepper.to_string())).hash(name)
}
