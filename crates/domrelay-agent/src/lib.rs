// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration for the domrelay bridge.
//!
//! The [`PollLoop`] is the central coordinator that:
//! - Classifies the visible conversation every tick
//! - Reseeds its cursor on first contact or after a context switch
//! - Relays new messages from other people to the backend
//! - Reports context and workspace changes
//! - Serves inbound "send this response" commands through a [`CommandDispatcher`]
//! - Stops cleanly on a cancellation signal

pub mod commands;
pub mod poll;
pub mod shutdown;

pub use commands::CommandDispatcher;
pub use poll::{LoopState, PollLoop, SharedPage, TickReport, shared_page};
pub use shutdown::install_signal_handler;
