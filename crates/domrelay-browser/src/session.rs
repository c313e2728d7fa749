// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment to a running Chromium over the DevTools protocol.
//!
//! The operator starts the browser (with `--remote-debugging-port`) and logs
//! into the messaging site by hand. [`CdpSession`] attaches to that browser,
//! picks the tab showing the site, and offers the few primitives the
//! platform adapters need: script evaluation and typing into a composer.

use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::page::Page;
use domrelay_core::DomRelayError;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Poll step while waiting for an element to render.
const ELEMENT_POLL: Duration = Duration::from_millis(250);

/// Delay after target discovery so the handler can attach to existing tabs.
const ATTACH_SETTLE: Duration = Duration::from_millis(500);

fn browser_error(message: impl std::fmt::Display, err: CdpError) -> DomRelayError {
    DomRelayError::Browser {
        message: format!("{message}: {err}"),
        source: None,
    }
}

/// A live connection to one tab of the operator's browser.
pub struct CdpSession {
    // Held so the connection stays open; never closed, the browser is not ours.
    _browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl std::fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpSession").finish_non_exhaustive()
    }
}

impl CdpSession {
    /// Connects to the DevTools endpoint and selects the tab whose URL
    /// contains `url_filter`.
    ///
    /// `debugger_url` may be the http endpoint (`http://localhost:9222`) or a
    /// browser websocket URL.
    pub async fn attach(
        debugger_url: &str,
        url_filter: &str,
        request_timeout: Duration,
    ) -> Result<Self, DomRelayError> {
        let handler_config = HandlerConfig {
            request_timeout,
            viewport: None,
            ..Default::default()
        };

        let (mut browser, mut handler) = Browser::connect_with_config(debugger_url, handler_config)
            .await
            .map_err(|e| {
                browser_error(format!("failed to connect to browser at {debugger_url}"), e)
            })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
            warn!("browser event handler exited (connection closed)");
        });

        let targets = browser
            .fetch_targets()
            .await
            .map_err(|e| browser_error("failed to list browser targets", e))?;
        debug!(targets = targets.len(), "discovered browser targets");
        tokio::time::sleep(ATTACH_SETTLE).await;

        let pages = browser
            .pages()
            .await
            .map_err(|e| browser_error("failed to list open pages", e))?;

        let mut selected = None;
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if url.contains(url_filter) {
                info!(url = %url, "attached to page");
                selected = Some(page);
                break;
            }
        }

        let Some(page) = selected else {
            handler.abort();
            return Err(DomRelayError::Browser {
                message: format!("no open tab matches '{url_filter}'"),
                source: None,
            });
        };

        Ok(Self {
            _browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    /// The URL the tab currently shows.
    pub async fn current_url(&self) -> Result<String, DomRelayError> {
        self.page
            .url()
            .await
            .map_err(|e| browser_error("failed to read page url", e))?
            .ok_or_else(|| DomRelayError::Browser {
                message: "page has no url".into(),
                source: None,
            })
    }

    /// Runs `script` in the page and deserializes its return value.
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> Result<T, DomRelayError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| browser_error("script evaluation failed", e))?
            .into_value()
            .map_err(|e| DomRelayError::Browser {
                message: format!("unexpected script result: {e}"),
                source: None,
            })
    }

    /// Waits up to `timeout` for `selector` to match an element.
    pub async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, DomRelayError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if tokio::time::Instant::now() >= deadline => {
                    return Err(delivery_error(
                        &format!("element '{selector}' did not appear within {timeout:?}"),
                        e,
                    ));
                }
                Err(_) => tokio::time::sleep(ELEMENT_POLL).await,
            }
        }
    }

    /// Focuses the composer at `selector`, types `text` and presses Enter.
    pub async fn type_and_submit(
        &self,
        selector: &str,
        text: &str,
        wait: Duration,
    ) -> Result<(), DomRelayError> {
        let composer = self.wait_for(selector, wait).await?;
        composer
            .click()
            .await
            .map_err(|e| delivery_error("failed to focus composer", e))?
            .type_str(text)
            .await
            .map_err(|e| delivery_error("failed to type into composer", e))?
            .press_key("Enter")
            .await
            .map_err(|e| delivery_error("failed to submit message", e))?;
        debug!(selector, chars = text.chars().count(), "typed message into composer");
        Ok(())
    }

    /// Whether the browser event loop is still running.
    pub fn is_connected(&self) -> bool {
        !self.handler.is_finished()
    }

    /// Detaches from the browser without closing it.
    pub fn detach(&self) {
        self.handler.abort();
    }
}

fn delivery_error(message: &str, err: CdpError) -> DomRelayError {
    DomRelayError::Delivery {
        message: format!("{message}: {err}"),
        source: None,
    }
}
