// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for domrelay integration tests.
//!
//! Provides mock adapters and a small harness for fast, deterministic tests
//! without a browser or a backend.
//!
//! # Components
//!
//! - [`MockPage`] - Scripted messaging page with captured sends
//! - [`MockRelay`] - Mock backend channel with command injection and event capture
//! - [`TestHarness`] - Both mocks plus a matching configuration

pub mod harness;
pub mod mock_page;
pub mod mock_relay;

pub use harness::{SELF_MARKER, TestHarness, record, unkeyed};
pub use mock_page::MockPage;
pub use mock_relay::MockRelay;
