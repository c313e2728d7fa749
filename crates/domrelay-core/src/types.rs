// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the detection core, the page adapters, and the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    /// A live messaging web page driven over the remote-debugging protocol.
    Page,
    /// The backend event channel.
    Relay,
}

// --- Ordering ---

/// A comparable position of a rendered message, usually time-based.
///
/// The unit is platform-defined (Slack: microseconds, Instagram: milliseconds)
/// but is always consistent within a single conversation context.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderingKey(pub i64);

impl OrderingKey {
    /// Parses a non-negative decimal string into a fixed-point key with `scale`
    /// fractional digits, without going through floating point.
    ///
    /// Extra fractional digits are truncated. `"1700000000.123456"` with
    /// scale 6 becomes `1700000000123456`.
    pub fn from_decimal_str(raw: &str, scale: u32) -> Option<Self> {
        let raw = raw.trim();
        let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let multiplier = 10_i64.checked_pow(scale)?;
        let whole: i64 = whole.parse().ok()?;

        let mut fraction = 0_i64;
        let mut place = multiplier;
        for digit in frac.bytes().take(scale as usize) {
            place /= 10;
            fraction += i64::from(digit - b'0') * place;
        }

        whole
            .checked_mul(multiplier)?
            .checked_add(fraction)
            .map(Self)
    }
}

impl From<i64> for OrderingKey {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Context ---

/// A distinguishable conversation scope: which conversation is shown, and
/// whether a sub-thread pane is open on top of it.
///
/// Two contexts are equal iff both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    /// Platform conversation identifier (Slack channel id, Instagram thread id).
    pub conversation_id: String,
    /// Whether a thread view is open.
    pub thread_open: bool,
}

impl Context {
    pub fn new(conversation_id: impl Into<String>, thread_open: bool) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            thread_open,
        }
    }

    /// Stable string form used as `context_id` in outbound events.
    pub fn id(&self) -> String {
        if self.thread_open {
            format!("{}#thread", self.conversation_id)
        } else {
            self.conversation_id.clone()
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

// --- Snapshot records and detected messages ---

/// One rendered message as scraped from the page, oldest first in a snapshot.
///
/// Every field may be missing: a scrape that cannot find an element leaves it
/// as `None` and the detection core substitutes a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub sender: Option<String>,
    pub content: Option<String>,
    pub key: Option<OrderingKey>,
}

impl RawRecord {
    pub fn new(
        sender: impl Into<String>,
        content: impl Into<String>,
        key: Option<OrderingKey>,
    ) -> Self {
        Self {
            sender: Some(sender.into()),
            content: Some(content.into()),
            key,
        }
    }
}

/// Identity of a detected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// The message rendered a comparable ordering key.
    Ordered(OrderingKey),
    /// No key could be read; a random token stands in and key-based
    /// deduplication does not apply.
    Synthetic(Uuid),
}

impl MessageKey {
    /// Creates a fresh synthetic identity.
    pub fn synthetic() -> Self {
        Self::Synthetic(Uuid::new_v4())
    }

    /// Returns the comparable key, if there is one.
    pub fn ordering_key(&self) -> Option<OrderingKey> {
        match self {
            Self::Ordered(key) => Some(*key),
            Self::Synthetic(_) => None,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordered(key) => write!(f, "{key}"),
            Self::Synthetic(id) => write!(f, "{id}"),
        }
    }
}

/// A message judged new by the detection core, ready to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender name as rendered, trimmed. Pseudonymized later, at relay time.
    pub sender: String,
    pub content: String,
    pub key: MessageKey,
    /// [`Context::id`] of the context the message was scanned in.
    pub context_id: String,
}

impl Message {
    pub fn ordering_key(&self) -> Option<OrderingKey> {
        self.key.ordering_key()
    }
}

// --- Workspace roster ---

/// Kind of a sidebar entry in a workspace roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RosterKind {
    Channel,
    PrivateChannel,
    Dm,
    GroupDm,
}

/// One conversation listed in the workspace sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RosterKind,
    /// Member names, only populated for group DMs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
}

/// Snapshot of a workspace's conversations, grouped the way the sidebar groups them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRoster {
    pub name: String,
    pub channels: Vec<RosterEntry>,
    pub private_channels: Vec<RosterEntry>,
    pub dms: Vec<RosterEntry>,
    pub group_dms: Vec<RosterEntry>,
}

// --- Relay wire events ---

/// Payload of an outbound `new_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub content: String,
    /// Sender name, or its salted hash when pseudonymization is on.
    pub sender_identity: String,
    pub ordering_key: Option<OrderingKey>,
    pub context_id: String,
    pub message_id: String,
    /// Operator account the bridge runs for.
    pub user_id: String,
}

/// Payload of an outbound `context_changed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextChangedEvent {
    pub new_context_id: String,
    pub conversation_id: String,
    pub thread_open: bool,
}

impl From<&Context> for ContextChangedEvent {
    fn from(context: &Context) -> Self {
        Self {
            new_context_id: context.id(),
            conversation_id: context.conversation_id.clone(),
            thread_open: context.thread_open,
        }
    }
}

/// Events pushed to the backend. Encoded as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    NewMessage(NewMessageEvent),
    ContextChanged(ContextChangedEvent),
    WorkspaceUpdate(WorkspaceRoster),
}

/// Where an inbound response should be typed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendScope {
    /// Whatever composer is active (thread composer if a thread is open).
    #[default]
    Current,
    /// The thread composer specifically.
    Thread,
}

/// Payload of an inbound `send_selected_response` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub selected_response: String,
    #[serde(default)]
    pub scope: SendScope,
}

/// Commands received from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundCommand {
    SendSelectedResponse(SendResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slack_timestamp_parses_exactly() {
        let key = OrderingKey::from_decimal_str("1700000000.123456", 6).unwrap();
        assert_eq!(key, OrderingKey(1_700_000_000_123_456));
    }

    #[test]
    fn short_fraction_is_padded() {
        assert_eq!(
            OrderingKey::from_decimal_str("12.5", 6),
            Some(OrderingKey(12_500_000))
        );
        assert_eq!(
            OrderingKey::from_decimal_str("12", 6),
            Some(OrderingKey(12_000_000))
        );
    }

    #[test]
    fn long_fraction_is_truncated() {
        assert_eq!(
            OrderingKey::from_decimal_str("1.1234567", 6),
            Some(OrderingKey(1_123_456))
        );
    }

    #[test]
    fn malformed_timestamps_are_rejected() {
        for raw in ["", ".5", "abc", "1.2.3", "-4.0", "1e9"] {
            assert_eq!(OrderingKey::from_decimal_str(raw, 6), None, "input {raw:?}");
        }
    }

    #[test]
    fn overflowing_timestamp_is_rejected() {
        assert_eq!(OrderingKey::from_decimal_str("99999999999999999", 6), None);
    }

    #[test]
    fn context_equality_needs_both_fields() {
        let main = Context::new("C1", false);
        assert_eq!(main, Context::new("C1", false));
        assert_ne!(main, Context::new("C1", true));
        assert_ne!(main, Context::new("C2", false));
    }

    #[test]
    fn context_id_marks_threads() {
        assert_eq!(Context::new("C1", false).id(), "C1");
        assert_eq!(Context::new("C1", true).id(), "C1#thread");
    }

    #[test]
    fn message_key_display() {
        assert_eq!(MessageKey::Ordered(OrderingKey(42)).to_string(), "42");
        assert!(MessageKey::synthetic().ordering_key().is_none());
    }

    #[test]
    fn outbound_event_uses_event_data_envelope() {
        let event = OutboundEvent::ContextChanged(ContextChangedEvent::from(&Context::new(
            "C9", true,
        )));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "context_changed");
        assert_eq!(json["data"]["new_context_id"], "C9#thread");
        assert_eq!(json["data"]["conversation_id"], "C9");
        assert_eq!(json["data"]["thread_open"], true);
    }

    #[test]
    fn new_message_key_serializes_as_number_or_null() {
        let keyed = NewMessageEvent {
            content: "hi".into(),
            sender_identity: "alice".into(),
            ordering_key: Some(OrderingKey(7)),
            context_id: "C1".into(),
            message_id: "7".into(),
            user_id: "me@example.com".into(),
        };
        let json = serde_json::to_value(OutboundEvent::NewMessage(keyed.clone())).unwrap();
        assert_eq!(json["data"]["ordering_key"], 7);

        let unkeyed = NewMessageEvent {
            ordering_key: None,
            ..keyed
        };
        let json = serde_json::to_value(OutboundEvent::NewMessage(unkeyed)).unwrap();
        assert!(json["data"]["ordering_key"].is_null());
    }

    #[test]
    fn inbound_command_scope_defaults_to_current() {
        let raw = r#"{"event":"send_selected_response","data":{"selected_response":"on my way"}}"#;
        let cmd: InboundCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(
            cmd,
            InboundCommand::SendSelectedResponse(SendResponse {
                selected_response: "on my way".into(),
                scope: SendScope::Current,
            })
        );
    }

    #[test]
    fn roster_uses_sidebar_field_names() {
        let roster = WorkspaceRoster {
            name: "acme".into(),
            group_dms: vec![RosterEntry {
                id: "G1".into(),
                name: "ann, bo".into(),
                kind: RosterKind::GroupDm,
                participants: vec!["ann".into(), "bo".into()],
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&roster).unwrap();
        assert!(json.get("privateChannels").is_some());
        assert_eq!(json["groupDms"][0]["type"], "group-dm");
        assert_eq!(json["groupDms"][0]["participants"][1], "bo");
    }

    proptest::proptest! {
        #[test]
        fn decimal_keys_match_integer_arithmetic(whole in 0i64..10_000_000_000, micros in 0i64..1_000_000) {
            let raw = format!("{whole}.{micros:06}");
            let key = OrderingKey::from_decimal_str(&raw, 6);
            proptest::prop_assert_eq!(key, Some(OrderingKey(whole * 1_000_000 + micros)));
        }

        #[test]
        fn decimal_keys_preserve_order(a in 0i64..1_000_000_000_000, b in 0i64..1_000_000_000_000) {
            let fmt = |v: i64| format!("{}.{:06}", v / 1_000_000, v % 1_000_000);
            let ka = OrderingKey::from_decimal_str(&fmt(a), 6);
            let kb = OrderingKey::from_decimal_str(&fmt(b), 6);
            proptest::prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }
    }
}
