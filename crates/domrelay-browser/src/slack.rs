// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack web client adapter.
//!
//! Conversation identity comes from the `channel` query parameter of the
//! client URL (falling back to the path). Message ordering keys are the
//! `data-ts` attribute of each message's timestamp link, parsed exactly into
//! microseconds.

use std::time::Duration;

use async_trait::async_trait;
use domrelay_core::types::{
    AdapterType, Context, HealthStatus, OrderingKey, RawRecord, RosterEntry, RosterKind,
    SendScope, WorkspaceRoster,
};
use domrelay_core::{DomRelayError, PageAdapter, PluginAdapter};
use serde::Deserialize;
use tracing::{debug, info};

use crate::session::CdpSession;

/// Host the Slack web client runs on.
pub const SLACK_HOST: &str = "app.slack.com";

/// Fractional digits in a Slack `ts` value.
const TS_SCALE: u32 = 6;

const MAIN_COMPOSER: &str = r#"div[data-qa="message_input"] div.ql-editor"#;
const THREAD_COMPOSER: &str =
    r#"div.p-threads_footer__input div[data-qa="message_input"] div.ql-editor"#;

const LOCATION_JS: &str = r#"(() => {
    const pane = document.querySelector('div.p-threads_view');
    return {
        url: window.location.href,
        threadOpen: !!pane && pane.offsetParent !== null,
    };
})()"#;

const THREAD_OPEN_JS: &str = r#"(() => {
    const pane = document.querySelector('div.p-threads_view');
    return !!pane && pane.offsetParent !== null;
})()"#;

const MAIN_MESSAGES: &str = "div.c-message_kit__background";
const THREAD_MESSAGES: &str = "div.c-virtual_list__item--thread div.c-message_kit__background";

/// Body of the snapshot script; `__SELECTOR__` is replaced with the list selector.
const SNAPSHOT_JS: &str = r#"(() => {
    const senderSelectors = [
        'a.c-message__sender_link',
        'button.c-message__sender_button',
        'span.c-message__sender',
        "span.offscreen[data-qa^='aria-labelledby']",
    ];
    const text = (el) => (el ? el.innerText.trim() : null);
    return Array.from(document.querySelectorAll('__SELECTOR__')).map((msg) => {
        let sender = null;
        for (const sel of senderSelectors) {
            const el = msg.querySelector(sel);
            if (el) { sender = text(el); break; }
        }
        const stamp = msg.querySelector('a.c-timestamp');
        return {
            sender,
            content: text(msg.querySelector('div.c-message_kit__blocks')),
            ts: stamp ? stamp.getAttribute('data-ts') : null,
        };
    });
})()"#;

const WORKSPACE_NAME_JS: &str = r#"(() => {
    const el = document.querySelector(
        "button[data-qa='workspace_actions_button'] .p-ia4_home_header_menu__team_name");
    return el ? el.innerText.trim() : null;
})()"#;

const ROSTER_JS: &str = r#"(() => {
    const list = (kind) => Array.from(document.querySelectorAll(
        `div.p-channel_sidebar__channel[data-qa-channel-sidebar-channel-type='${kind}']`
    )).map((el) => {
        const name = el.querySelector('.p-channel_sidebar__name');
        return {
            id: el.getAttribute('data-qa-channel-sidebar-channel-id') || '',
            name: name ? name.innerText.trim() : '',
        };
    });
    return {
        channels: list('channel'),
        privateChannels: list('private'),
        dms: list('im'),
        groupDms: list('mpim'),
    };
})()"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    url: String,
    thread_open: bool,
}

/// One message as returned by the snapshot script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedMessage {
    pub sender: Option<String>,
    pub content: Option<String>,
    pub ts: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapedEntry {
    pub id: String,
    pub name: String,
}

/// Sidebar contents as returned by the roster script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedRoster {
    pub channels: Vec<ScrapedEntry>,
    pub private_channels: Vec<ScrapedEntry>,
    pub dms: Vec<ScrapedEntry>,
    pub group_dms: Vec<ScrapedEntry>,
}

/// Extracts the conversation identifier from a Slack client URL.
///
/// Prefers the `channel` query parameter, then the URL path.
pub fn conversation_id_from_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    if let Some((_, channel)) = url.query_pairs().find(|(k, _)| k == "channel")
        && !channel.is_empty()
    {
        return Some(channel.into_owned());
    }
    match url.path() {
        "" | "/" => None,
        path => Some(path.to_string()),
    }
}

/// Converts scraped messages into raw records, oldest first.
///
/// Unparseable `ts` values become missing keys.
pub fn parse_records(scraped: Vec<ScrapedMessage>) -> Vec<RawRecord> {
    scraped
        .into_iter()
        .map(|m| RawRecord {
            key: m
                .ts
                .as_deref()
                .and_then(|ts| OrderingKey::from_decimal_str(ts, TS_SCALE)),
            sender: m.sender.filter(|s| !s.is_empty()),
            content: m.content,
        })
        .collect()
}

/// Assembles a roster from the sidebar scrape. Group DM participants are
/// split out of the comma-separated display name.
pub fn build_roster(name: String, scraped: ScrapedRoster) -> WorkspaceRoster {
    let entries = |list: Vec<ScrapedEntry>, kind: RosterKind| -> Vec<RosterEntry> {
        list.into_iter()
            .filter(|e| !e.id.is_empty())
            .map(|e| {
                let participants = if kind == RosterKind::GroupDm {
                    e.name
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                } else {
                    Vec::new()
                };
                RosterEntry {
                    id: e.id,
                    name: e.name,
                    kind,
                    participants,
                }
            })
            .collect()
    };

    WorkspaceRoster {
        name,
        channels: entries(scraped.channels, RosterKind::Channel),
        private_channels: entries(scraped.private_channels, RosterKind::PrivateChannel),
        dms: entries(scraped.dms, RosterKind::Dm),
        group_dms: entries(scraped.group_dms, RosterKind::GroupDm),
    }
}

/// Picks the composer for a send.
pub fn composer_selector(scope: SendScope, thread_open: bool) -> &'static str {
    match scope {
        SendScope::Thread => THREAD_COMPOSER,
        SendScope::Current if thread_open => THREAD_COMPOSER,
        SendScope::Current => MAIN_COMPOSER,
    }
}

/// [`PageAdapter`] over a Slack web client tab.
#[derive(Debug)]
pub struct SlackPage {
    session: CdpSession,
    composer_wait: Duration,
}

impl SlackPage {
    pub fn new(session: CdpSession, composer_wait: Duration) -> Self {
        Self {
            session,
            composer_wait,
        }
    }
}

#[async_trait]
impl PluginAdapter for SlackPage {
    fn name(&self) -> &str {
        "slack"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Page
    }

    async fn health_check(&self) -> Result<HealthStatus, DomRelayError> {
        if !self.session.is_connected() {
            return Ok(HealthStatus::Unhealthy("browser connection closed".into()));
        }
        match self.session.current_url().await {
            Ok(url) if url.contains(SLACK_HOST) => Ok(HealthStatus::Healthy),
            Ok(url) => Ok(HealthStatus::Degraded(format!("tab left Slack: {url}"))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), DomRelayError> {
        debug!("detaching from Slack tab");
        self.session.detach();
        Ok(())
    }
}

#[async_trait]
impl PageAdapter for SlackPage {
    async fn classify(&self) -> Result<Option<Context>, DomRelayError> {
        let location: Location = self.session.evaluate(LOCATION_JS).await?;
        Ok(conversation_id_from_url(&location.url)
            .map(|id| Context::new(id, location.thread_open)))
    }

    async fn snapshot(&self, context: &Context) -> Result<Vec<RawRecord>, DomRelayError> {
        let selector = if context.thread_open {
            THREAD_MESSAGES
        } else {
            MAIN_MESSAGES
        };
        let script = SNAPSHOT_JS.replace("__SELECTOR__", selector);
        let scraped: Vec<ScrapedMessage> = self
            .session
            .evaluate(&script)
            .await
            .map_err(|e| DomRelayError::scrape(e.to_string()))?;
        debug!(context = %context, rendered = scraped.len(), "took Slack snapshot");
        Ok(parse_records(scraped))
    }

    async fn send_text(&self, text: &str, scope: SendScope) -> Result<(), DomRelayError> {
        let thread_open: bool = self.session.evaluate(THREAD_OPEN_JS).await?;
        let selector = composer_selector(scope, thread_open);
        self.session
            .type_and_submit(selector, text, self.composer_wait)
            .await?;
        info!(?scope, thread_open, "sent response to Slack");
        Ok(())
    }

    async fn workspace_name(&self) -> Result<Option<String>, DomRelayError> {
        let name: Option<String> = self.session.evaluate(WORKSPACE_NAME_JS).await?;
        Ok(name.filter(|n| !n.is_empty()))
    }

    async fn workspace_roster(&self) -> Result<Option<WorkspaceRoster>, DomRelayError> {
        let Some(name) = self.workspace_name().await? else {
            return Ok(None);
        };
        let scraped: ScrapedRoster = self.session.evaluate(ROSTER_JS).await?;
        Ok(Some(build_roster(name, scraped)))
    }
}
