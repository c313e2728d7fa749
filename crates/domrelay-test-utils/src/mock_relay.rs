// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock relay adapter for deterministic testing.
//!
//! `MockRelay` implements `RelayAdapter` with injectable inbound commands and
//! captured outbound events for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use domrelay_core::traits::adapter::PluginAdapter;
use domrelay_core::traits::relay::RelayAdapter;
use domrelay_core::types::{
    AdapterType, ContextChangedEvent, HealthStatus, InboundCommand, NewMessageEvent,
    OutboundEvent, SendResponse, SendScope,
};
use domrelay_core::DomRelayError;

#[derive(Debug, Default)]
struct RelayState {
    inbound: VecDeque<InboundCommand>,
    emitted: Vec<OutboundEvent>,
    fail_emits: usize,
    fail_after: Option<usize>,
    closed: bool,
    connected: bool,
    shut_down: bool,
}

/// A mock backend channel.
///
/// - **inbound**: commands injected via `inject_command()` are returned by `receive()`
/// - **emitted**: events passed to `emit()` are captured for inspection
#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    state: Arc<Mutex<RelayState>>,
    notify: Arc<Notify>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command for the next `receive()`.
    pub async fn inject_command(&self, command: InboundCommand) {
        self.state.lock().await.inbound.push_back(command);
        self.notify.notify_one();
    }

    /// Queue a `send_selected_response` command.
    pub async fn inject_response(&self, text: &str, scope: SendScope) {
        self.inject_command(InboundCommand::SendSelectedResponse(SendResponse {
            selected_response: text.to_string(),
            scope,
        }))
        .await;
    }

    /// After the queue drains, `receive()` reports the relay as closed.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_one();
    }

    /// Makes the next `n` emits fail.
    pub async fn fail_next_emits(&self, n: usize) {
        self.state.lock().await.fail_emits = n;
    }

    /// Lets `successes` more emits through, then fails exactly one.
    pub async fn fail_emit_after(&self, successes: usize) {
        self.state.lock().await.fail_after = Some(successes);
    }

    pub async fn emitted(&self) -> Vec<OutboundEvent> {
        self.state.lock().await.emitted.clone()
    }

    /// Only the `new_message` payloads, in emission order.
    pub async fn new_messages(&self) -> Vec<NewMessageEvent> {
        self.emitted()
            .await
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::NewMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Only the `context_changed` payloads, in emission order.
    pub async fn context_changes(&self) -> Vec<ContextChangedEvent> {
        self.emitted()
            .await
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::ContextChanged(change) => Some(change),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_emitted(&self) {
        self.state.lock().await.emitted.clear();
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn is_shut_down(&self) -> bool {
        self.state.lock().await.shut_down
    }
}

#[async_trait]
impl PluginAdapter for MockRelay {
    fn name(&self) -> &str {
        "mock-relay"
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
        let mut state = self.state.lock().await;
        state.shut_down = true;
        state.closed = true;
        drop(state);
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl RelayAdapter for MockRelay {
    async fn connect(&mut self) -> Result<(), DomRelayError> {
        self.state.lock().await.connected = true;
        Ok(())
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), DomRelayError> {
        let mut state = self.state.lock().await;
        if state.fail_emits > 0 {
            state.fail_emits -= 1;
            return Err(DomRelayError::relay("mock emit failure"));
        }
        match state.fail_after {
            Some(0) => {
                state.fail_after = None;
                return Err(DomRelayError::relay("mock emit failure"));
            }
            Some(n) => state.fail_after = Some(n - 1),
            None => {}
        }
        state.emitted.push(event);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundCommand, DomRelayError> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(command) = state.inbound.pop_front() {
                    return Ok(command);
                }
                if state.closed {
                    return Err(DomRelayError::RelayClosed);
                }
            }
            self.notify.notified().await;
        }
    }
}
