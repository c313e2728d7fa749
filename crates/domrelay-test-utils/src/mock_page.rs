// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock page adapter for deterministic testing.
//!
//! `MockPage` implements `PageAdapter` over scripted page state. Clones share
//! that state, so a test can keep one handle while the code under test owns
//! another behind a `Box<dyn PageAdapter>`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use domrelay_core::traits::adapter::PluginAdapter;
use domrelay_core::traits::page::PageAdapter;
use domrelay_core::types::{
    AdapterType, Context, HealthStatus, RawRecord, SendScope, WorkspaceRoster,
};
use domrelay_core::DomRelayError;

#[derive(Debug, Default)]
struct PageState {
    context: Option<Context>,
    records: Vec<RawRecord>,
    workspace: Option<String>,
    roster: Option<WorkspaceRoster>,
    fail_classify: usize,
    fail_snapshot: usize,
    fail_send: bool,
    sent: Vec<(String, SendScope)>,
    snapshots: usize,
    shut_down: bool,
}

/// A scripted messaging page.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    state: Arc<Mutex<PageState>>,
    self_labels: &'static [&'static str],
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page that labels its own account's messages with `labels`.
    pub fn with_self_labels(labels: &'static [&'static str]) -> Self {
        Self {
            self_labels: labels,
            ..Self::default()
        }
    }

    /// Shows `conversation_id`, with or without a thread pane.
    pub async fn show(&self, conversation_id: &str, thread_open: bool) {
        self.state.lock().await.context = Some(Context::new(conversation_id, thread_open));
    }

    /// Shows a screen that identifies no conversation.
    pub async fn show_nothing(&self) {
        self.state.lock().await.context = None;
    }

    /// Replaces the rendered messages.
    pub async fn set_records(&self, records: Vec<RawRecord>) {
        self.state.lock().await.records = records;
    }

    /// Appends a newly rendered message.
    pub async fn push_record(&self, record: RawRecord) {
        self.state.lock().await.records.push(record);
    }

    pub async fn set_workspace(&self, name: &str, roster: WorkspaceRoster) {
        let mut state = self.state.lock().await;
        state.workspace = Some(name.to_string());
        state.roster = Some(roster);
    }

    /// Makes the next `n` classifications fail.
    pub async fn fail_next_classify(&self, n: usize) {
        self.state.lock().await.fail_classify = n;
    }

    /// Makes the next `n` snapshots fail.
    pub async fn fail_next_snapshot(&self, n: usize) {
        self.state.lock().await.fail_snapshot = n;
    }

    pub async fn fail_sends(&self, fail: bool) {
        self.state.lock().await.fail_send = fail;
    }

    /// Texts typed through `send_text`, with their scope.
    pub async fn sent_texts(&self) -> Vec<(String, SendScope)> {
        self.state.lock().await.sent.clone()
    }

    /// Number of snapshots taken so far, failed ones included.
    pub async fn snapshot_count(&self) -> usize {
        self.state.lock().await.snapshots
    }

    pub async fn is_shut_down(&self) -> bool {
        self.state.lock().await.shut_down
    }
}

#[async_trait]
impl PluginAdapter for MockPage {
    fn name(&self) -> &str {
        "mock-page"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Page
    }

    async fn health_check(&self) -> Result<HealthStatus, DomRelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DomRelayError> {
        self.state.lock().await.shut_down = true;
        Ok(())
    }
}

#[async_trait]
impl PageAdapter for MockPage {
    fn self_labels(&self) -> &'static [&'static str] {
        self.self_labels
    }

    async fn classify(&self) -> Result<Option<Context>, DomRelayError> {
        let mut state = self.state.lock().await;
        if state.fail_classify > 0 {
            state.fail_classify -= 1;
            return Err(DomRelayError::Browser {
                message: "mock classify failure".into(),
                source: None,
            });
        }
        Ok(state.context.clone())
    }

    async fn snapshot(&self, _context: &Context) -> Result<Vec<RawRecord>, DomRelayError> {
        let mut state = self.state.lock().await;
        state.snapshots += 1;
        if state.fail_snapshot > 0 {
            state.fail_snapshot -= 1;
            return Err(DomRelayError::scrape("mock snapshot failure"));
        }
        Ok(state.records.clone())
    }

    async fn send_text(&self, text: &str, scope: SendScope) -> Result<(), DomRelayError> {
        let mut state = self.state.lock().await;
        if state.fail_send {
            return Err(DomRelayError::delivery("mock composer not found"));
        }
        state.sent.push((text.to_string(), scope));
        Ok(())
    }

    async fn workspace_name(&self) -> Result<Option<String>, DomRelayError> {
        Ok(self.state.lock().await.workspace.clone())
    }

    async fn workspace_roster(&self) -> Result<Option<WorkspaceRoster>, DomRelayError> {
        Ok(self.state.lock().await.roster.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domrelay_core::OrderingKey;

    #[tokio::test]
    async fn clones_share_state() {
        let page = MockPage::new();
        let boxed: Box<dyn PageAdapter> = Box::new(page.clone());

        page.show("C1", false).await;
        page.set_records(vec![RawRecord::new("bob", "hi", Some(OrderingKey(1)))])
            .await;

        let context = boxed.classify().await.unwrap().unwrap();
        assert_eq!(context, Context::new("C1", false));
        assert_eq!(boxed.snapshot(&context).await.unwrap().len(), 1);
        assert_eq!(page.snapshot_count().await, 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let page = MockPage::new();
        page.show("C1", false).await;
        page.fail_next_snapshot(1).await;

        let context = Context::new("C1", false);
        assert!(page.snapshot(&context).await.is_err());
        assert!(page.snapshot(&context).await.is_ok());
    }

    #[tokio::test]
    async fn sends_are_captured() {
        let page = MockPage::new();
        page.send_text("hello", SendScope::Thread).await.unwrap();
        assert_eq!(
            page.sent_texts().await,
            vec![("hello".to_string(), SendScope::Thread)]
        );

        page.fail_sends(true).await;
        assert!(matches!(
            page.send_text("again", SendScope::Current).await,
            Err(DomRelayError::Delivery { .. })
        ));
    }
}
