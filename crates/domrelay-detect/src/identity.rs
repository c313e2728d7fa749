// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recognizing the operator's own messages.

use domrelay_config::model::{IdentityConfig, MatchMode};
use domrelay_core::DomRelayError;

/// Trims, lower-cases and collapses whitespace runs to a single space.
pub fn normalize_sender(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Configured markers that identify self-authored messages.
#[derive(Debug, Clone)]
pub struct SelfIdentity {
    markers: Vec<String>,
    mode: MatchMode,
    labels: Vec<String>,
}

impl SelfIdentity {
    /// Builds an identity from raw markers. Blank markers are dropped.
    pub fn new<I, S>(markers: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| normalize_sender(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        Self {
            markers,
            mode,
            labels: Vec::new(),
        }
    }

    /// Adds sender labels that always match exactly, whatever the mode.
    pub fn with_exact_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels.extend(
            labels
                .into_iter()
                .map(|l| normalize_sender(l.as_ref()))
                .filter(|l| !l.is_empty()),
        );
        self
    }

    /// Builds the identity from config, refusing to run without markers:
    /// with none, the bridge would relay its own replies back.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, DomRelayError> {
        let identity = Self::new(&config.markers, config.match_mode);
        if identity.markers.is_empty() {
            return Err(DomRelayError::Config(
                "identity.markers must name at least one self marker".into(),
            ));
        }
        Ok(identity)
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn matches(&self, sender: &str) -> bool {
        let sender = normalize_sender(sender);
        if self.labels.contains(&sender) {
            return true;
        }
        match self.mode {
            MatchMode::Substring => self.markers.iter().any(|m| sender.contains(m.as_str())),
            MatchMode::Exact => self.markers.iter().any(|m| *m == sender),
        }
    }
}
