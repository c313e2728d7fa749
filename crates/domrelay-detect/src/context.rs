// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation context tracking between polls.

use domrelay_core::{Context, PageAdapter};
use tracing::warn;

/// Outcome of comparing the observed context with the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextChange {
    /// First context ever observed.
    Initial(Context),
    /// The page now shows a different conversation or thread state.
    Changed { previous: Context, current: Context },
    Unchanged(Context),
    /// The page state identified no conversation, or could not be read.
    /// Treated as "no change"; `last` is whatever was seen before, if anything.
    Unknown { last: Option<Context> },
}

impl ContextChange {
    /// The context to work in after this observation.
    pub fn current(&self) -> Option<&Context> {
        match self {
            Self::Initial(current) | Self::Unchanged(current) => Some(current),
            Self::Changed { current, .. } => Some(current),
            Self::Unknown { last } => last.as_ref(),
        }
    }

    /// Whether the cursor must be reseeded before scanning.
    pub fn needs_reseed(&self) -> bool {
        matches!(self, Self::Initial(_) | Self::Changed { .. })
    }
}

/// Remembers the last known context and reports transitions.
#[derive(Debug, Default)]
pub struct ContextClassifier {
    last: Option<Context>,
}

impl ContextClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&Context> {
        self.last.as_ref()
    }

    /// Folds a raw observation into the stored state.
    pub fn observe(&mut self, observed: Option<Context>) -> ContextChange {
        let Some(current) = observed else {
            return ContextChange::Unknown {
                last: self.last.clone(),
            };
        };

        match self.last.replace(current.clone()) {
            None => ContextChange::Initial(current),
            Some(previous) if previous == current => ContextChange::Unchanged(current),
            Some(previous) => ContextChange::Changed { previous, current },
        }
    }

    /// Asks the page for its context and folds the answer in.
    ///
    /// Page errors are not fatal here: they are logged and reported as
    /// [`ContextChange::Unknown`].
    pub async fn classify(&mut self, page: &dyn PageAdapter) -> ContextChange {
        match page.classify().await {
            Ok(Some(context)) => self.observe(Some(context)),
            Ok(None) => {
                warn!(last = ?self.last, "page shows no recognizable conversation");
                self.observe(None)
            }
            Err(e) => {
                warn!(error = %e, last = ?self.last, "context classification failed");
                self.observe(None)
            }
        }
    }
}
