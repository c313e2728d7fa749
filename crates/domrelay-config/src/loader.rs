// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./domrelay.toml` > `~/.config/domrelay/domrelay.toml`
//! > `/etc/domrelay/domrelay.toml`, with environment variable overrides via the
//! `DOMRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DomRelayConfig;

/// Config file name looked up in every hierarchy directory.
pub const CONFIG_FILE_NAME: &str = "domrelay.toml";

/// Top-level sections, used to turn `DOMRELAY_<SECTION>_<KEY>` into `<section>.<key>`.
const SECTIONS: &[&str] = &["client", "poll", "identity", "browser", "relay"];

/// The config files consulted, lowest precedence first.
pub fn hierarchy_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/domrelay").join(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("domrelay").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Build the layered Figment without extracting it.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. Each file from [`hierarchy_paths`]
/// 3. `DOMRELAY_*` environment variables
pub fn build_figment() -> Figment {
    let figment = hierarchy_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(DomRelayConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        );
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<DomRelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DomRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DomRelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DomRelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DomRelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `DOMRELAY_POLL_INTERVAL_SECS` to `poll.interval_secs`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that themselves contain underscores stay intact.
fn env_provider() -> Env {
    Env::prefixed("DOMRELAY_").map(|key| env_key_to_path(key.as_str()).into())
}

fn env_key_to_path(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
