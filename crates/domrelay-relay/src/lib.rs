// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend event channel for the domrelay bridge.
//!
//! Implements [`RelayAdapter`] twice: [`WebSocketRelay`] speaks the JSON
//! frame protocol in [`protocol`] over tokio-tungstenite, and [`LogRelay`]
//! only prints what would have been sent.

pub mod log;
pub mod protocol;
pub mod websocket;

use std::sync::Arc;

use domrelay_config::model::{RelayConfig, RelayKind};
use domrelay_core::{DomRelayError, RelayAdapter};

pub use log::LogRelay;
pub use websocket::WebSocketRelay;

/// Builds and connects the configured relay.
pub async fn connect_relay(config: &RelayConfig) -> Result<Arc<dyn RelayAdapter>, DomRelayError> {
    match config.kind {
        RelayKind::Websocket => {
            let mut relay = WebSocketRelay::new(config);
            relay.connect().await?;
            Ok(Arc::new(relay))
        }
        RelayKind::Log => {
            let mut relay = LogRelay::new();
            relay.connect().await?;
            Ok(Arc::new(relay))
        }
    }
}
