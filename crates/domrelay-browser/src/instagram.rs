// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instagram Direct adapter.
//!
//! Conversations live at `/direct/t/<id>/` and never have a thread pane.
//! Messages carry an ordering key only when a `time[datetime]` element is
//! rendered; most are unkeyed and rely on fingerprint dedup downstream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use domrelay_core::types::{AdapterType, Context, HealthStatus, OrderingKey, RawRecord, SendScope};
use domrelay_core::{DomRelayError, PageAdapter, PluginAdapter};
use serde::Deserialize;
use tracing::{debug, info};

use crate::session::CdpSession;

/// Path prefix of Direct conversations; also the default tab filter.
pub const INSTAGRAM_HOST: &str = "instagram.com/direct";

/// Sender shown for the operator's own bubbles, which render without a name.
pub const OWN_SENDER: &str = "You";

const COMPOSER: &str =
    "textarea[aria-label*='Message'], div[role='textbox'][aria-label*='Message']";

const URL_JS: &str = "window.location.href";

const SNAPSHOT_JS: &str = r#"(() => {
    return Array.from(document.querySelectorAll("div[role='gridcell']")).map((cell) => {
        const name = cell.querySelector('h5 span');
        const parts = Array.from(cell.querySelectorAll('[dir=auto]:not([role])'))
            .map((el) => el.innerText.trim())
            .filter((t) => t.length > 0);
        const time = cell.querySelector('time[datetime]');
        return {
            sender: name ? name.innerText.trim() : null,
            content: parts.length ? parts.join(' ') : null,
            datetime: time ? time.getAttribute('datetime') : null,
        };
    });
})()"#;

/// One message bubble as returned by the snapshot script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedBubble {
    pub sender: Option<String>,
    pub content: Option<String>,
    pub datetime: Option<String>,
}

/// Extracts the thread id from a `/direct/t/<id>/` URL.
pub fn conversation_id_from_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next()) {
        (Some("direct"), Some("t"), Some(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Parses an RFC 3339 timestamp into a millisecond ordering key.
pub fn key_from_datetime(raw: &str) -> Option<OrderingKey> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| OrderingKey(dt.timestamp_millis()))
}

/// Converts scraped bubbles into raw records, oldest first.
///
/// Bubbles without a rendered name are the operator's own and get
/// [`OWN_SENDER`], which the adapter reports as a self label.
pub fn parse_records(scraped: Vec<ScrapedBubble>) -> Vec<RawRecord> {
    scraped
        .into_iter()
        .map(|b| RawRecord {
            sender: Some(
                b.sender
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| OWN_SENDER.to_string()),
            ),
            content: b.content,
            key: b.datetime.as_deref().and_then(key_from_datetime),
        })
        .collect()
}

/// [`PageAdapter`] over an Instagram Direct tab.
#[derive(Debug)]
pub struct InstagramPage {
    session: CdpSession,
    composer_wait: Duration,
}

impl InstagramPage {
    pub fn new(session: CdpSession, composer_wait: Duration) -> Self {
        Self {
            session,
            composer_wait,
        }
    }
}

#[async_trait]
impl PluginAdapter for InstagramPage {
    fn name(&self) -> &str {
        "instagram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Page
    }

    async fn health_check(&self) -> Result<HealthStatus, DomRelayError> {
        if self.session.is_connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("browser connection closed".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), DomRelayError> {
        debug!("detaching from Instagram tab");
        self.session.detach();
        Ok(())
    }
}

#[async_trait]
impl PageAdapter for InstagramPage {
    fn self_labels(&self) -> &'static [&'static str] {
        &[OWN_SENDER]
    }

    async fn classify(&self) -> Result<Option<Context>, DomRelayError> {
        let url: String = self.session.evaluate(URL_JS).await?;
        Ok(conversation_id_from_url(&url).map(|id| Context::new(id, false)))
    }

    async fn snapshot(&self, context: &Context) -> Result<Vec<RawRecord>, DomRelayError> {
        let scraped: Vec<ScrapedBubble> = self
            .session
            .evaluate(SNAPSHOT_JS)
            .await
            .map_err(|e| DomRelayError::scrape(e.to_string()))?;
        debug!(context = %context, rendered = scraped.len(), "took Instagram snapshot");
        Ok(parse_records(scraped))
    }

    async fn send_text(&self, text: &str, scope: SendScope) -> Result<(), DomRelayError> {
        if scope == SendScope::Thread {
            debug!("Instagram has no threads, sending to the conversation");
        }
        self.session
            .type_and_submit(COMPOSER, text, self.composer_wait)
            .await?;
        info!("sent response to Instagram");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_thread_urls_yield_the_thread_id() {
        assert_eq!(
            conversation_id_from_url("https://www.instagram.com/direct/t/1234567/"),
            Some("1234567".into())
        );
        assert_eq!(
            conversation_id_from_url("https://www.instagram.com/direct/inbox/"),
            None
        );
        assert_eq!(conversation_id_from_url("https://www.instagram.com/"), None);
    }

    #[test]
    fn datetime_becomes_milliseconds() {
        assert_eq!(
            key_from_datetime("2024-01-01T00:00:00.250Z"),
            Some(OrderingKey(1_704_067_200_250))
        );
        assert_eq!(key_from_datetime("yesterday"), None);
    }

    #[test]
    fn unnamed_bubbles_are_the_operators() {
        let records = parse_records(vec![
            ScrapedBubble {
                sender: None,
                content: Some("mine".into()),
                datetime: None,
            },
            ScrapedBubble {
                sender: Some("kim".into()),
                content: Some("theirs".into()),
                datetime: Some("2024-01-01T00:00:01Z".into()),
            },
        ]);
        assert_eq!(records[0].sender.as_deref(), Some(OWN_SENDER));
        assert_eq!(records[0].key, None);
        assert_eq!(records[1].sender.as_deref(), Some("kim"));
        assert_eq!(records[1].key, Some(OrderingKey(1_704_067_201_000)));
    }
}
