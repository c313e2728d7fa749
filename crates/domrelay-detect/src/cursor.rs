// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-context "last processed" position.
//!
//! The cursor only moves forward. The sole way back is [`CursorTracker::reset`],
//! which the poll loop calls when the visible context changes. State lives in
//! memory only; after a restart the loop reseeds from the live page.

use std::collections::HashMap;

use domrelay_core::{Context, Message, OrderingKey};

type Fingerprint = (String, String);

/// Tracks the last relayed ordering key per context, plus how often each
/// unkeyed message has already been relayed.
#[derive(Debug, Default)]
pub struct CursorTracker {
    cursors: HashMap<Context, OrderingKey>,
    unkeyed: HashMap<Context, HashMap<Fingerprint, usize>>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the cursor of `context` to `key` if that is further along.
    ///
    /// Returns whether the stored cursor changed.
    pub fn advance(&mut self, context: &Context, key: OrderingKey) -> bool {
        match self.cursors.get_mut(context) {
            Some(current) if *current >= key => false,
            Some(current) => {
                *current = key;
                true
            }
            None => {
                self.cursors.insert(context.clone(), key);
                true
            }
        }
    }

    /// Forgets everything known about `context`, so the next scan reseeds.
    pub fn reset(&mut self, context: &Context) {
        self.cursors.remove(context);
        self.unkeyed.remove(context);
    }

    pub fn current(&self, context: &Context) -> Option<OrderingKey> {
        self.cursors.get(context).copied()
    }

    /// Drops unkeyed messages that were already relayed in `context`.
    ///
    /// The n-th occurrence of a `(sender, content)` pair in `batch` passes only
    /// if that pair has been relayed fewer than n times. Keyed messages pass
    /// through untouched; the cursor already deduplicates them.
    pub fn unseen(&self, context: &Context, batch: Vec<Message>) -> Vec<Message> {
        let seen = self.unkeyed.get(context);
        let mut occurrences: HashMap<Fingerprint, usize> = HashMap::new();

        batch
            .into_iter()
            .filter(|message| {
                if message.ordering_key().is_some() {
                    return true;
                }
                let fingerprint = fingerprint(message);
                let already = seen
                    .and_then(|counts| counts.get(&fingerprint))
                    .copied()
                    .unwrap_or(0);
                let index = occurrences.entry(fingerprint).or_insert(0);
                let keep = *index >= already;
                *index += 1;
                keep
            })
            .collect()
    }

    /// Records that `message` was relayed in `context`.
    pub fn record_relayed(&mut self, context: &Context, message: &Message) {
        match message.ordering_key() {
            Some(key) => {
                self.advance(context, key);
            }
            None => {
                *self
                    .unkeyed
                    .entry(context.clone())
                    .or_default()
                    .entry(fingerprint(message))
                    .or_insert(0) += 1;
            }
        }
    }

    /// Marks every unkeyed message currently visible in `context` as seen,
    /// without relaying it. Used after a reseed so older history is not
    /// picked up on the next tick.
    pub fn mark_visible(&mut self, context: &Context, visible: &[Message]) {
        let mut occurrences: HashMap<Fingerprint, usize> = HashMap::new();
        for message in visible.iter().filter(|m| m.ordering_key().is_none()) {
            *occurrences.entry(fingerprint(message)).or_insert(0) += 1;
        }
        if occurrences.is_empty() {
            return;
        }

        let counts = self.unkeyed.entry(context.clone()).or_default();
        for (fingerprint, count) in occurrences {
            let stored = counts.entry(fingerprint).or_insert(0);
            *stored = (*stored).max(count);
        }
    }
}

fn fingerprint(message: &Message) -> Fingerprint {
    (message.sender.clone(), message.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domrelay_core::MessageKey;
    use proptest::prelude::*;

    fn ctx(id: &str) -> Context {
        Context::new(id, false)
    }

    fn unkeyed(sender: &str, content: &str) -> Message {
        Message {
            sender: sender.into(),
            content: content.into(),
            key: MessageKey::synthetic(),
            context_id: "C1".into(),
        }
    }

    #[test]
    fn advance_is_monotonic() {
        let mut tracker = CursorTracker::new();
        let c = ctx("C1");
        assert!(tracker.advance(&c, OrderingKey(5)));
        assert!(!tracker.advance(&c, OrderingKey(3)));
        assert!(!tracker.advance(&c, OrderingKey(5)));
        assert_eq!(tracker.current(&c), Some(OrderingKey(5)));
        assert!(tracker.advance(&c, OrderingKey(9)));
        assert_eq!(tracker.current(&c), Some(OrderingKey(9)));
    }

    #[test]
    fn cursors_are_scoped_per_context() {
        let mut tracker = CursorTracker::new();
        let channel = Context::new("C1", false);
        let thread = Context::new("C1", true);
        tracker.advance(&channel, OrderingKey(10));
        assert_eq!(tracker.current(&thread), None);
        tracker.advance(&thread, OrderingKey(2));
        assert_eq!(tracker.current(&channel), Some(OrderingKey(10)));
    }

    #[test]
    fn reset_clears_cursor_and_unkeyed_memory() {
        let mut tracker = CursorTracker::new();
        let c = ctx("C1");
        tracker.advance(&c, OrderingKey(10));
        tracker.record_relayed(&c, &unkeyed("bob", "hi"));
        tracker.reset(&c);

        assert_eq!(tracker.current(&c), None);
        let batch = tracker.unseen(&c, vec![unkeyed("bob", "hi")]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn relayed_unkeyed_messages_are_not_repeated() {
        let mut tracker = CursorTracker::new();
        let c = ctx("C1");
        let first = unkeyed("bob", "hi");
        tracker.record_relayed(&c, &first);

        let batch = tracker.unseen(&c, vec![unkeyed("bob", "hi"), unkeyed("bob", "again")]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].content, "again");
    }

    #[test]
    fn repeated_unkeyed_text_is_counted() {
        let mut tracker = CursorTracker::new();
        let c = ctx("C1");
        tracker.record_relayed(&c, &unkeyed("bob", "ok"));

        // A second "ok" rendered below the first is new.
        let batch = tracker.unseen(&c, vec![unkeyed("bob", "ok"), unkeyed("bob", "ok")]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn keyed_messages_pass_unseen_untouched() {
        let tracker = CursorTracker::new();
        let keyed = Message {
            sender: "bob".into(),
            content: "hi".into(),
            key: MessageKey::Ordered(OrderingKey(1)),
            context_id: "C1".into(),
        };
        assert_eq!(tracker.unseen(&ctx("C1"), vec![keyed.clone()]), vec![keyed]);
    }

    #[test]
    fn mark_visible_suppresses_history() {
        let mut tracker = CursorTracker::new();
        let c = ctx("C1");
        let visible = vec![unkeyed("a", "1"), unkeyed("b", "2"), unkeyed("a", "1")];
        tracker.mark_visible(&c, &visible);

        let again = tracker.unseen(&c, visible.clone());
        assert!(again.is_empty());

        let mut grown = visible;
        grown.push(unkeyed("c", "3"));
        let fresh = tracker.unseen(&c, grown);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].sender, "c");
    }

    proptest! {
        #[test]
        fn advance_never_decreases(keys in proptest::collection::vec(any::<i64>(), 0..64)) {
            let mut tracker = CursorTracker::new();
            let c = ctx("C1");
            let mut previous: Option<OrderingKey> = None;
            for key in keys {
                tracker.advance(&c, OrderingKey(key));
                let current = tracker.current(&c);
                prop_assert!(current >= previous);
                prop_assert!(current >= Some(OrderingKey(key)));
                previous = current;
            }
        }
    }
}
