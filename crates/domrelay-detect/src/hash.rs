// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic sender pseudonymization.
//!
//! `salt = HMAC-SHA256(pepper, sender)[..16]` and
//! `hash = hex(SHA-256(sender || salt || pepper))`, over the normalized sender
//! name. The same sender always maps to the same hash for a given pepper.
//! This hides names from the backend; it is not an authentication scheme.

use domrelay_config::model::IdentityConfig;
use domrelay_core::DomRelayError;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::identity::normalize_sender;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;

pub struct SenderHasher {
    pepper: SecretString,
}

impl std::fmt::Debug for SenderHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderHasher").finish_non_exhaustive()
    }
}

impl SenderHasher {
    pub fn new(pepper: SecretString) -> Self {
        Self { pepper }
    }

    /// Returns a hasher when `hash_senders` is on, `None` when it is off.
    pub fn from_config(config: &IdentityConfig) -> Result<Option<Self>, DomRelayError> {
        if !config.hash_senders {
            return Ok(None);
        }
        match config.pepper.as_deref() {
            Some(pepper) if !pepper.is_empty() => {
                Ok(Some(Self::new(SecretString::from(pepper.to_string()))))
            }
            _ => Err(DomRelayError::Config(
                "identity.pepper is required when identity.hash_senders is enabled".into(),
            )),
        }
    }

    pub fn derive_salt(&self, normalized: &str) -> Result<[u8; SALT_LEN], DomRelayError> {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.pepper.expose_secret().as_bytes()) else {
            return Err(DomRelayError::Internal("HMAC rejected the pepper".into()));
        };
        mac.update(normalized.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&digest[..SALT_LEN]);
        Ok(salt)
    }

    /// Hex pseudonym for `sender`, after normalization.
    pub fn hash(&self, sender: &str) -> Result<String, DomRelayError> {
        let normalized = normalize_sender(sender);
        let salt = self.derive_salt(&normalized)?;

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(salt);
        hasher.update(self.pepper.expose_secret().as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
