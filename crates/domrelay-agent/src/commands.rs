// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound command handling.
//!
//! Commands arrive on the relay's transport independently of the poll loop.
//! Each one is handled to completion under the shared page lock, so typing
//! into the page never interleaves with a scrape.

use std::sync::Arc;
use std::time::Duration;

use domrelay_core::types::SendResponse;
use domrelay_core::{DomRelayError, InboundCommand, RelayAdapter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::poll::SharedPage;

/// Pause after a receive error before asking the relay again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct CommandDispatcher {
    page: SharedPage,
    relay: Arc<dyn RelayAdapter>,
}

impl CommandDispatcher {
    pub fn new(page: SharedPage, relay: Arc<dyn RelayAdapter>) -> Self {
        Self { page, relay }
    }

    /// Serves commands until the relay closes or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        debug!("command dispatcher running");

        loop {
            let received = tokio::select! {
                received = self.relay.receive() => received,
                _ = cancel.cancelled() => break,
            };

            match received {
                Ok(command) => {
                    // Outcomes are logged, never sent back to the backend.
                    if let Err(e) = self.handle(command).await {
                        warn!(error = %e, "inbound command failed");
                    }
                }
                Err(DomRelayError::RelayClosed) => {
                    info!("relay closed, command dispatcher stopping");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to receive inbound command");
                    tokio::select! {
                        _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }

        debug!("command dispatcher stopped");
    }

    /// Executes a single command against the page.
    pub async fn handle(&self, command: InboundCommand) -> Result<(), DomRelayError> {
        match command {
            InboundCommand::SendSelectedResponse(SendResponse {
                selected_response,
                scope,
            }) => {
                if selected_response.trim().is_empty() {
                    return Err(DomRelayError::delivery("refusing to send an empty response"));
                }

                let page = self.page.lock().await;
                page.send_text(&selected_response, scope).await?;
                info!(
                    chars = selected_response.chars().count(),
                    scope = ?scope,
                    "response delivered"
                );
                Ok(())
            }
        }
    }
}
