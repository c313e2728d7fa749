// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `domrelay check` command implementation.
//!
//! Runs diagnostic checks against the configuration and, with `--live`,
//! against the browser and the backend the bridge would use.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use domrelay_config::DomRelayConfig;
use domrelay_config::model::RelayKind;
use domrelay_core::types::HealthStatus;
use domrelay_core::{PageAdapter, PluginAdapter};
use domrelay_detect::{SelfIdentity, SenderHasher};

/// Upper bound for each live probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Runs the checks and prints a report. Returns false if any check failed.
pub async fn run_check(config_path: Option<&Path>, live: bool, plain: bool) -> bool {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = Vec::new();

    let (config_result, config) = check_config(config_path);
    results.push(config_result);

    if let Some(config) = &config {
        results.push(check_identity(config));
        results.push(check_hashing(config));

        if live {
            results.push(check_browser(config).await);
            results.push(check_backend(config).await);
        }
    }

    print_report(&results, use_color, live);
    !results.iter().any(|r| r.status == CheckStatus::Fail)
}

fn print_report(results: &[CheckResult], use_color: bool, live: bool) {
    println!();
    println!("  domrelay check");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in results {
        let duration_ms = result.duration.as_millis();
        let (symbol, plain_tag) = match result.status {
            CheckStatus::Pass => ("✓", "[OK]  "),
            CheckStatus::Warn => {
                warn_count += 1;
                ("!", "[WARN]")
            }
            CheckStatus::Fail => {
                fail_count += 1;
                ("✗", "[FAIL]")
            }
        };

        let line = if use_color {
            use colored::Colorize;
            let (symbol, message) = match result.status {
                CheckStatus::Pass => (symbol.green(), result.message.normal()),
                CheckStatus::Warn => (symbol.yellow(), result.message.yellow()),
                CheckStatus::Fail => (symbol.red(), result.message.red()),
            };
            format!(
                "    {symbol} {:<20} {message} ({duration_ms}ms)",
                result.name
            )
        } else {
            format!(
                "    {plain_tag} {:<20} {} ({duration_ms}ms)",
                result.name, result.message
            )
        };
        println!("{line}");
    }

    println!();

    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    if !live {
        println!("  Run with --live to probe the browser and backend.");
    }

    println!();
}

/// Check configuration loads without errors.
fn check_config(path: Option<&Path>) -> (CheckResult, Option<DomRelayConfig>) {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => domrelay_config::load_and_validate_path(path),
        None => domrelay_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => (
            CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
            Some(config),
        ),
        Err(errors) => {
            domrelay_config::render_errors(&errors);
            (
                CheckResult::new(
                    "Configuration",
                    CheckStatus::Fail,
                    format!("{} error(s)", errors.len()),
                    start,
                ),
                None,
            )
        }
    }
}

/// Check that own messages can be recognized.
fn check_identity(config: &DomRelayConfig) -> CheckResult {
    let start = Instant::now();
    match SelfIdentity::from_config(&config.identity) {
        Ok(identity) => CheckResult::new(
            "Self identity",
            CheckStatus::Pass,
            format!(
                "{} marker(s), {:?} match",
                identity.markers().len(),
                config.identity.match_mode
            ),
            start,
        ),
        Err(e) => CheckResult::new("Self identity", CheckStatus::Fail, e.to_string(), start),
    }
}

fn check_hashing(config: &DomRelayConfig) -> CheckResult {
    let start = Instant::now();
    match SenderHasher::from_config(&config.identity) {
        Ok(Some(_)) => CheckResult::new("Sender hashing", CheckStatus::Pass, "on", start),
        Ok(None) => CheckResult::new(
            "Sender hashing",
            CheckStatus::Warn,
            "off, sender names are relayed in clear",
            start,
        ),
        Err(e) => CheckResult::new("Sender hashing", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Attach to the browser and look at the selected tab.
async fn check_browser(config: &DomRelayConfig) -> CheckResult {
    let start = Instant::now();
    let attach = tokio::time::timeout(
        PROBE_TIMEOUT,
        domrelay_browser::connect_page(&config.browser),
    )
    .await;

    let page = match attach {
        Ok(Ok(page)) => page,
        Ok(Err(e)) => return CheckResult::new("Browser", CheckStatus::Fail, e.to_string(), start),
        Err(_) => {
            return CheckResult::new(
                "Browser",
                CheckStatus::Fail,
                format!("no answer from {} within {PROBE_TIMEOUT:?}", config.browser.debugger_url),
                start,
            );
        }
    };

    let result = match page.health_check().await {
        Ok(HealthStatus::Healthy) => match page.classify().await {
            Ok(Some(context)) => CheckResult::new(
                "Browser",
                CheckStatus::Pass,
                format!("{} tab showing {context}", page.name()),
                start,
            ),
            Ok(None) => CheckResult::new(
                "Browser",
                CheckStatus::Warn,
                format!("{} tab open but no conversation selected", page.name()),
                start,
            ),
            Err(e) => CheckResult::new("Browser", CheckStatus::Warn, e.to_string(), start),
        },
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new("Browser", CheckStatus::Warn, reason, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("Browser", CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new("Browser", CheckStatus::Fail, e.to_string(), start),
    };

    if let Err(e) = page.shutdown().await {
        tracing::debug!(error = %e, "page shutdown after probe failed");
    }
    result
}

/// Open (and close) a connection to the backend.
async fn check_backend(config: &DomRelayConfig) -> CheckResult {
    let start = Instant::now();
    if config.relay.kind == RelayKind::Log {
        return CheckResult::new(
            "Backend",
            CheckStatus::Warn,
            "log relay selected, nothing is sent",
            start,
        );
    }

    match tokio::time::timeout(PROBE_TIMEOUT, domrelay_relay::connect_relay(&config.relay)).await {
        Ok(Ok(relay)) => {
            if let Err(e) = relay.shutdown().await {
                tracing::debug!(error = %e, "relay shutdown after probe failed");
            }
            CheckResult::new(
                "Backend",
                CheckStatus::Pass,
                format!("connected to {}", config.relay.url),
                start,
            )
        }
        Ok(Err(e)) => CheckResult::new("Backend", CheckStatus::Fail, e.to_string(), start),
        Err(_) => CheckResult::new(
            "Backend",
            CheckStatus::Fail,
            format!("no answer from {} within {PROBE_TIMEOUT:?}", config.relay.url),
            start,
        ),
    }
}
