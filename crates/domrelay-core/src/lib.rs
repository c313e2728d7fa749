// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the domrelay messaging bridge.
//!
//! This crate provides the error type, the shared data model (contexts,
//! ordering keys, raw records, relay events), and the adapter traits that the
//! page automation and backend relay crates implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::DomRelayError;
pub use types::{
    AdapterType, Context, HealthStatus, InboundCommand, Message, MessageKey, OrderingKey,
    OutboundEvent, RawRecord, SendScope,
};

pub use traits::{PageAdapter, PluginAdapter, RelayAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render() {
        let cases = [
            (DomRelayError::Config("bad".into()), "configuration error: bad"),
            (DomRelayError::scrape("no list"), "scrape error: no list"),
            (DomRelayError::delivery("no composer"), "delivery error: no composer"),
            (DomRelayError::relay("socket gone"), "relay error: socket gone"),
            (DomRelayError::RelayClosed, "relay closed"),
            (DomRelayError::Internal("x".into()), "internal error: x"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Page, AdapterType::Relay] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_page_adapter<T: PageAdapter>() {}
        fn _assert_relay_adapter<T: RelayAdapter>() {}
    }
}
