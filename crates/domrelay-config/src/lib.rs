// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the domrelay bridge.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `DOMRELAY_*` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use domrelay_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("poll every {}s", config.poll.interval_secs);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::DomRelayConfig;

use std::path::Path;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<DomRelayConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<DomRelayConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Load configuration from an inline TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<DomRelayConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<DomRelayConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<DomRelayConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        // Source files are only read on failure, for span resolution.
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Read every existing hierarchy file, keyed by the path figment reports.
fn collect_toml_sources() -> Vec<(String, String)> {
    loader::hierarchy_paths()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let shown = if path.is_relative() {
                std::env::current_dir()
                    .map(|dir| dir.join(&path))
                    .unwrap_or(path)
            } else {
                path
            };
            Some((shown.display().to_string(), content))
        })
        .collect()
}
