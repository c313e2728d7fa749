// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Print-only relay for dry runs: events go to the log, no commands arrive.

use async_trait::async_trait;
use domrelay_core::types::{AdapterType, HealthStatus, InboundCommand, OutboundEvent};
use domrelay_core::{DomRelayError, PluginAdapter, RelayAdapter};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::protocol;

#[derive(Debug, Default)]
pub struct LogRelay {
    closed: CancellationToken,
}

impl LogRelay {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for LogRelay {
    fn name(&self) -> &str {
        "log"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Relay
    }

    async fn health_check(&self) -> Result<HealthStatus, DomRelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DomRelayError> {
        self.closed.cancel();
        Ok(())
    }
}

#[async_trait]
impl RelayAdapter for LogRelay {
    async fn connect(&mut self) -> Result<(), DomRelayError> {
        info!("log relay active, events are printed and not sent");
        Ok(())
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), DomRelayError> {
        let frame = protocol::encode(&event)?;
        info!(event = protocol::event_name(&event), frame = %frame, "relay event");
        Ok(())
    }

    /// Never yields a command; returns [`DomRelayError::RelayClosed`] after shutdown.
    async fn receive(&self) -> Result<InboundCommand, DomRelayError> {
        self.closed.cancelled().await;
        Err(DomRelayError::RelayClosed)
    }
}
