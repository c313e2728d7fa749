// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the domrelay bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level domrelay configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DomRelayConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub client: ClientConfig,

    /// Poll loop timing and first-contact behavior.
    #[serde(default)]
    pub poll: PollConfig,

    /// How the operator's own messages are recognized, and sender pseudonymization.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Remote-debugging browser connection.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Backend event channel.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Display name used in logs.
    #[serde(default = "default_client_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Operator account id attached to every relayed message.
    #[serde(default)]
    pub user_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            log_level: default_log_level(),
            user_id: String::new(),
        }
    }
}

fn default_client_name() -> String {
    "domrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Poll loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Seconds between polls of the page.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// How many recent messages to relay on first contact with a conversation
    /// where the operator has never written.
    #[serde(default = "default_fallback_count")]
    pub fallback_count: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            fallback_count: default_fallback_count(),
        }
    }
}

fn default_interval_secs() -> u64 {
    5
}

fn default_fallback_count() -> usize {
    5
}

/// How a sender name is compared against the configured markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The sender name contains a marker. Catches display-name variants but
    /// can misfire on other people whose names contain the marker.
    #[default]
    Substring,
    /// The sender name equals a marker.
    Exact,
}

/// Self-identity and pseudonymization configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Sender names (or fragments, in substring mode) that denote the operator.
    /// Compared case-insensitively after whitespace normalization.
    #[serde(default)]
    pub markers: Vec<String>,

    /// Marker comparison mode.
    #[serde(default)]
    pub match_mode: MatchMode,

    /// Replace sender names with salted hashes before relaying.
    #[serde(default)]
    pub hash_senders: bool,

    /// Secret pepper for sender hashing. Required when `hash_senders` is on.
    #[serde(default)]
    pub pepper: Option<String>,
}

/// Messaging platform rendered in the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Slack,
    Instagram,
}

/// Remote-debugging browser configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserConfig {
    /// Which platform's page scripts to use.
    #[serde(default)]
    pub platform: Platform,

    /// Debugger endpoint of an already running Chrome
    /// (`--remote-debugging-port`), as `http://` or `ws://`.
    #[serde(default = "default_debugger_url")]
    pub debugger_url: String,

    /// Per-command DevTools timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long to wait for the message composer to appear before giving up a send.
    #[serde(default = "default_composer_wait_ms")]
    pub composer_wait_ms: u64,

    /// Pick the first tab whose URL contains this string. Defaults to the
    /// platform's host.
    #[serde(default)]
    pub url_contains: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            debugger_url: default_debugger_url(),
            request_timeout_ms: default_request_timeout_ms(),
            composer_wait_ms: default_composer_wait_ms(),
            url_contains: None,
        }
    }
}

fn default_debugger_url() -> String {
    "http://localhost:9222".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_composer_wait_ms() -> u64 {
    10_000
}

/// Backend transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    /// JSON events over a WebSocket.
    #[default]
    Websocket,
    /// Log events locally and accept no commands.
    Log,
}

/// Backend event channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    #[serde(default)]
    pub kind: RelayKind,

    /// WebSocket endpoint of the backend.
    #[serde(default = "default_relay_url")]
    pub url: String,

    /// Delay between reconnect attempts after the socket drops.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            kind: RelayKind::default(),
            url: default_relay_url(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

fn default_relay_url() -> String {
    "ws://localhost:3001/messaging".to_string()
}

fn default_reconnect_secs() -> u64 {
    5
}
