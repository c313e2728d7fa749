// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Page adapter trait for messaging web UIs (Slack, Instagram Direct).

use async_trait::async_trait;

use crate::error::DomRelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Context, RawRecord, SendScope, WorkspaceRoster};

/// Capability interface over one live messaging page.
///
/// One implementation exists per target platform. The detection core only
/// ever sees contexts and raw records; selectors and scripts stay behind
/// this trait. Callers serialize all access to a page through a single lock.
#[async_trait]
pub trait PageAdapter: PluginAdapter {
    /// Derives the conversation context currently shown.
    ///
    /// Returns `Ok(None)` when the page state does not identify a conversation
    /// (for example, a settings screen is open).
    async fn classify(&self) -> Result<Option<Context>, DomRelayError>;

    /// Returns the rendered messages of `context`, oldest first.
    async fn snapshot(&self, context: &Context) -> Result<Vec<RawRecord>, DomRelayError>;

    /// Types `text` into the composer selected by `scope` and submits it.
    async fn send_text(&self, text: &str, scope: SendScope) -> Result<(), DomRelayError>;

    /// Sender labels the platform itself renders for messages sent from this
    /// account, matched exactly on top of the configured markers.
    fn self_labels(&self) -> &'static [&'static str] {
        &[]
    }

    /// Returns the name of the active workspace, for platforms that have one.
    async fn workspace_name(&self) -> Result<Option<String>, DomRelayError> {
        Ok(None)
    }

    /// Returns the sidebar roster of the active workspace, for platforms that have one.
    async fn workspace_roster(&self) -> Result<Option<WorkspaceRoster>, DomRelayError> {
        Ok(None)
    }
}
