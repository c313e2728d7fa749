// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON framing for the backend event channel.
//!
//! Every frame is a text frame `{"event": <name>, "data": <payload>}`.

use domrelay_core::types::{InboundCommand, OutboundEvent};
use domrelay_core::DomRelayError;
use serde_json::Value;
use tracing::debug;

/// Event names the backend may send.
pub const INBOUND_EVENTS: &[&str] = &["send_selected_response"];

/// Wire name of an outbound event.
pub fn event_name(event: &OutboundEvent) -> &'static str {
    match event {
        OutboundEvent::NewMessage(_) => "new_message",
        OutboundEvent::ContextChanged(_) => "context_changed",
        OutboundEvent::WorkspaceUpdate(_) => "workspace_update",
    }
}

/// Serializes an outbound event into a text frame.
pub fn encode(event: &OutboundEvent) -> Result<String, DomRelayError> {
    serde_json::to_string(event).map_err(|e| DomRelayError::Relay {
        message: format!("failed to encode {} event", event_name(event)),
        source: Some(Box::new(e)),
    })
}

/// Parses an inbound text frame.
///
/// Returns `Ok(None)` for well-formed frames carrying an event this client
/// does not handle.
pub fn decode(frame: &str) -> Result<Option<InboundCommand>, DomRelayError> {
    let value: Value = serde_json::from_str(frame).map_err(|e| DomRelayError::Relay {
        message: "inbound frame is not JSON".into(),
        source: Some(Box::new(e)),
    })?;

    let Some(name) = value.get("event").and_then(Value::as_str) else {
        return Err(DomRelayError::relay("inbound frame has no event name"));
    };
    if !INBOUND_EVENTS.contains(&name) {
        debug!(event = name, "ignoring unhandled inbound event");
        return Ok(None);
    }

    let name = name.to_string();
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| DomRelayError::Relay {
            message: format!("malformed {name} frame"),
            source: Some(Box::new(e)),
        })
}
