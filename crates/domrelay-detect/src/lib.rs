// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental message detection for re-rendered chat pages.
//!
//! The page offers no event stream and no stable pagination, only whatever
//! happens to be rendered right now. This crate decides which of those
//! rendered messages are new since the last poll:
//!
//! - [`CursorTracker`] remembers, per context, how far relaying has got.
//! - [`ContextClassifier`] notices when the conversation or thread changes.
//! - [`MessageFilter`] picks the new, non-self, non-blank records.
//! - [`SelfIdentity`] recognizes the operator's own messages.
//! - [`SenderHasher`] pseudonymizes sender names for the backend.

pub mod context;
pub mod cursor;
pub mod filter;
pub mod hash;
pub mod identity;

pub use context::{ContextChange, ContextClassifier};
pub use cursor::CursorTracker;
pub use filter::{MessageFilter, UNKNOWN_SENDER};
pub use hash::SenderHasher;
pub use identity::{SelfIdentity, normalize_sender};
