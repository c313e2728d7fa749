// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay adapter trait for the backend event channel.

use async_trait::async_trait;

use crate::error::DomRelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundCommand, OutboundEvent};

/// Adapter for the bidirectional backend event channel.
///
/// Outbound events are fire-and-forget from the caller's view; inbound
/// commands are pulled one at a time with [`receive`](RelayAdapter::receive).
#[async_trait]
pub trait RelayAdapter: PluginAdapter {
    /// Establishes the connection to the backend.
    async fn connect(&mut self) -> Result<(), DomRelayError>;

    /// Pushes an event to the backend.
    async fn emit(&self, event: OutboundEvent) -> Result<(), DomRelayError>;

    /// Waits for the next inbound command.
    ///
    /// Returns [`DomRelayError::RelayClosed`] once no further commands can arrive.
    async fn receive(&self) -> Result<InboundCommand, DomRelayError>;
}
