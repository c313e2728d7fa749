// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `domrelay serve` command implementation.
//!
//! Attaches to the operator's browser, connects the configured relay, and
//! runs the poll loop until SIGINT or SIGTERM.

use domrelay_agent::{PollLoop, install_signal_handler, shared_page};
use domrelay_config::DomRelayConfig;
use domrelay_core::{DomRelayError, PluginAdapter};
use domrelay_detect::SelfIdentity;
use tracing::{error, info};

/// Runs the bridge until shutdown.
pub async fn run_serve(config: DomRelayConfig) -> Result<(), DomRelayError> {
    init_tracing(&config.client.log_level);

    info!(
        client = config.client.name.as_str(),
        platform = ?config.browser.platform,
        relay = ?config.relay.kind,
        interval_secs = config.poll.interval_secs,
        "starting domrelay"
    );

    // Fail before touching the browser if own messages could not be recognized.
    SelfIdentity::from_config(&config.identity)?;

    let page = domrelay_browser::connect_page(&config.browser)
        .await
        .inspect_err(|e| error!(error = %e, "could not attach to the browser"))?;

    let relay = match domrelay_relay::connect_relay(&config.relay).await {
        Ok(relay) => relay,
        Err(e) => {
            error!(error = %e, url = %config.relay.url, "could not connect to the backend");
            if let Err(e) = page.shutdown().await {
                error!(error = %e, "page shutdown failed");
            }
            return Err(e);
        }
    };

    let poll_loop = PollLoop::new(shared_page(page), relay, &config)?;
    let cancel = install_signal_handler();
    poll_loop.run(cancel).await?;

    info!("domrelay stopped");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("domrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
