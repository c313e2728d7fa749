// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Browser-backed page adapters for the domrelay bridge.
//!
//! Attaches to an already-running Chromium over the DevTools protocol
//! (chromiumoxide) and implements [`PageAdapter`] for the Slack web client
//! and Instagram Direct.

pub mod instagram;
pub mod session;
pub mod slack;

use std::time::Duration;

use domrelay_config::model::{BrowserConfig, Platform};
use domrelay_core::{DomRelayError, PageAdapter};
use tracing::info;

pub use instagram::InstagramPage;
pub use session::CdpSession;
pub use slack::SlackPage;

/// Default tab filter for a platform.
pub fn default_url_filter(platform: Platform) -> &'static str {
    match platform {
        Platform::Slack => slack::SLACK_HOST,
        Platform::Instagram => instagram::INSTAGRAM_HOST,
    }
}

/// Attaches to the configured browser and returns the platform's page adapter.
pub async fn connect_page(config: &BrowserConfig) -> Result<Box<dyn PageAdapter>, DomRelayError> {
    let filter = config
        .url_contains
        .as_deref()
        .unwrap_or_else(|| default_url_filter(config.platform));
    info!(
        platform = ?config.platform,
        debugger_url = %config.debugger_url,
        filter,
        "attaching to browser"
    );

    let session = CdpSession::attach(
        &config.debugger_url,
        filter,
        Duration::from_millis(config.request_timeout_ms),
    )
    .await?;
    let composer_wait = Duration::from_millis(config.composer_wait_ms);

    Ok(match config.platform {
        Platform::Slack => Box::new(SlackPage::new(session, composer_wait)),
        Platform::Instagram => Box::new(InstagramPage::new(session, composer_wait)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_point_at_each_platform() {
        assert_eq!(default_url_filter(Platform::Slack), "app.slack.com");
        assert!(default_url_filter(Platform::Instagram).contains("instagram.com"));
    }
}
