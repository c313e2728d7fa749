// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring a mock page and a mock relay to a configuration.
//!
//! `TestHarness` holds handles to both mocks plus the config the code under
//! test should run with, and hands out the boxed/shared adapter forms.

use std::sync::Arc;

use domrelay_config::model::{DomRelayConfig, MatchMode, RelayKind};
use domrelay_core::types::{OrderingKey, RawRecord};
use domrelay_core::{PageAdapter, RelayAdapter};
use tokio::sync::Mutex;

use crate::mock_page::MockPage;
use crate::mock_relay::MockRelay;

/// Self marker used by harness configs unless overridden.
pub const SELF_MARKER: &str = "pearl";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    markers: Vec<String>,
    match_mode: MatchMode,
    fallback_count: usize,
    pepper: Option<String>,
    user_id: String,
    self_labels: &'static [&'static str],
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            markers: vec![SELF_MARKER.to_string()],
            match_mode: MatchMode::Substring,
            fallback_count: 2,
            pepper: None,
            user_id: "U-test".to_string(),
            self_labels: &[],
        }
    }

    pub fn with_markers(mut self, markers: &[&str], mode: MatchMode) -> Self {
        self.markers = markers.iter().map(|m| m.to_string()).collect();
        self.match_mode = mode;
        self
    }

    pub fn with_fallback_count(mut self, n: usize) -> Self {
        self.fallback_count = n;
        self
    }

    /// Turns on sender hashing with the given pepper.
    pub fn with_hashing(mut self, pepper: &str) -> Self {
        self.pepper = Some(pepper.to_string());
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    /// Makes the mock page report `labels` as its own-message senders.
    pub fn with_self_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.self_labels = labels;
        self
    }

    pub fn build(self) -> TestHarness {
        let mut config = DomRelayConfig::default();
        config.client.user_id = self.user_id;
        config.poll.interval_secs = 1;
        config.poll.fallback_count = self.fallback_count;
        config.identity.markers = self.markers;
        config.identity.match_mode = self.match_mode;
        config.identity.hash_senders = self.pepper.is_some();
        config.identity.pepper = self.pepper;
        config.relay.kind = RelayKind::Log;

        TestHarness {
            page: MockPage::with_self_labels(self.self_labels),
            relay: MockRelay::new(),
            config,
        }
    }
}

/// Mock adapters plus the config to run against them.
pub struct TestHarness {
    pub page: MockPage,
    pub relay: MockRelay,
    pub config: DomRelayConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default options.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// The page in the shared, lockable form the poll loop expects.
    pub fn shared_page(&self) -> Arc<Mutex<Box<dyn PageAdapter>>> {
        let page: Box<dyn PageAdapter> = Box::new(self.page.clone());
        Arc::new(Mutex::new(page))
    }

    pub fn relay_handle(&self) -> Arc<dyn RelayAdapter> {
        Arc::new(self.relay.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A keyed record.
pub fn record(sender: &str, content: &str, key: i64) -> RawRecord {
    RawRecord::new(sender, content, Some(OrderingKey(key)))
}

/// A record whose ordering key could not be read.
pub fn unkeyed(sender: &str, content: &str) -> RawRecord {
    RawRecord::new(sender, content, None)
}
