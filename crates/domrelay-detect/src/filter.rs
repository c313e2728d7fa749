// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting the new, relayable subset of a page snapshot.
//!
//! A snapshot is everything currently rendered, oldest first. The filter drops
//! what the operator wrote, what is blank, and what lies at or behind the
//! cursor, then orders the rest by ordering key.

use domrelay_core::{Context, Message, MessageKey, OrderingKey, RawRecord};

use crate::identity::SelfIdentity;

/// Sender substituted when a record's sender element could not be read.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Stateless filter over raw snapshot records.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    identity: SelfIdentity,
}

/// A message plus the key it sorts by. Unkeyed messages borrow the key of the
/// nearest keyed record before them in scan order.
struct Candidate {
    sort_key: Option<OrderingKey>,
    message: Message,
}

impl MessageFilter {
    pub fn new(identity: SelfIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &SelfIdentity {
        &self.identity
    }

    /// Returns the records that are new relative to `cursor`, oldest first.
    ///
    /// With a `boundary`, scanning stops at the first record whose key is at
    /// or past it. Records without a key skip the cursor check but are still
    /// dropped when self-authored or blank.
    ///
    /// Callers must not use this with neither cursor nor boundary on first
    /// contact; that would relay the whole visible history. Use
    /// [`recent_fallback`](Self::recent_fallback) instead.
    pub fn filter_new(
        &self,
        context: &Context,
        records: &[RawRecord],
        cursor: Option<OrderingKey>,
        boundary: Option<OrderingKey>,
    ) -> Vec<Message> {
        let mut candidates = Vec::new();
        let mut inherited = None;

        for record in records {
            if let (Some(key), Some(boundary)) = (record.key, boundary)
                && key >= boundary
            {
                break;
            }

            let sort_key = record.key.or(inherited);
            if record.key.is_some() {
                inherited = record.key;
            }

            if let (Some(key), Some(cursor)) = (record.key, cursor)
                && key <= cursor
            {
                continue;
            }

            if let Some(message) = self.relayable(context, record) {
                candidates.push(Candidate { sort_key, message });
            }
        }

        order(candidates)
    }

    /// Every relayable record in the snapshot, ignoring cursors.
    pub fn candidates(&self, context: &Context, records: &[RawRecord]) -> Vec<Message> {
        self.filter_new(context, records, None, None)
    }

    /// The `n` most recent relayable records, oldest first.
    ///
    /// Self-authored and blank records are excluded before counting, so the
    /// result holds up to `n` messages from other people.
    pub fn recent_fallback(
        &self,
        context: &Context,
        records: &[RawRecord],
        n: usize,
    ) -> Vec<Message> {
        let mut all = self.candidates(context, records);
        let skip = all.len().saturating_sub(n);
        all.drain(..skip);
        all
    }

    /// Key of the operator's latest keyed message in the snapshot.
    pub fn last_self_key(&self, records: &[RawRecord]) -> Option<OrderingKey> {
        records
            .iter()
            .filter(|r| self.identity.matches(sender_of(r)))
            .filter_map(|r| r.key)
            .max()
    }

    /// Greatest key rendered in the snapshot, from anyone.
    pub fn high_water(&self, records: &[RawRecord]) -> Option<OrderingKey> {
        records.iter().filter_map(|r| r.key).max()
    }

    fn relayable(&self, context: &Context, record: &RawRecord) -> Option<Message> {
        let sender = sender_of(record);
        if self.identity.matches(sender) {
            return None;
        }

        let content = record.content.as_deref().unwrap_or_default().trim();
        if content.is_empty() {
            return None;
        }

        Some(Message {
            sender: sender.to_string(),
            content: content.to_string(),
            key: record
                .key
                .map_or_else(MessageKey::synthetic, MessageKey::Ordered),
            context_id: context.id(),
        })
    }
}

fn sender_of(record: &RawRecord) -> &str {
    match record.sender.as_deref().map(str::trim) {
        Some(sender) if !sender.is_empty() => sender,
        _ => UNKNOWN_SENDER,
    }
}

fn order(mut candidates: Vec<Candidate>) -> Vec<Message> {
    // Stable: equal keys keep scan order.
    candidates.sort_by_key(|c| c.sort_key);
    candidates.into_iter().map(|c| c.message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use domrelay_config::model::MatchMode;
    use proptest::prelude::*;

    fn filter() -> MessageFilter {
        MessageFilter::new(SelfIdentity::new(["self"], MatchMode::Exact))
    }

    fn rec(sender: &str, content: &str, key: i64) -> RawRecord {
        RawRecord::new(sender, content, Some(OrderingKey(key)))
    }

    fn unkeyed(sender: &str, content: &str) -> RawRecord {
        RawRecord::new(sender, content, None)
    }

    fn summary(messages: &[Message]) -> Vec<(String, String, Option<i64>)> {
        messages
            .iter()
            .map(|m| (m.sender.clone(), m.content.clone(), m.ordering_key().map(|k| k.0)))
            .collect()
    }

    fn ctx() -> Context {
        Context::new("C1", false)
    }

    fn sample() -> Vec<RawRecord> {
        vec![rec("A", "hi", 1), rec("self", "yo", 2), rec("B", "hey", 3)]
    }

    #[test]
    fn drops_self_and_keeps_order() {
        let out = filter().filter_new(&ctx(), &sample(), Some(OrderingKey(0)), None);
        assert_eq!(
            summary(&out),
            vec![
                ("A".into(), "hi".into(), Some(1)),
                ("B".into(), "hey".into(), Some(3)),
            ]
        );
    }

    #[test]
    fn boundary_stops_scanning() {
        let out = filter().filter_new(&ctx(), &sample(), None, Some(OrderingKey(2)));
        assert_eq!(summary(&out), vec![("A".into(), "hi".into(), Some(1))]);
    }

    #[test]
    fn cursor_skips_processed_records() {
        let out = filter().filter_new(&ctx(), &sample(), Some(OrderingKey(1)), None);
        assert_eq!(summary(&out), vec![("B".into(), "hey".into(), Some(3))]);
    }

    #[test]
    fn second_pass_after_advancing_yields_nothing() {
        let f = filter();
        let first = f.filter_new(&ctx(), &sample(), Some(OrderingKey(0)), None);
        let cursor = first.iter().filter_map(Message::ordering_key).max();
        assert!(f.filter_new(&ctx(), &sample(), cursor, None).is_empty());
    }

    #[test]
    fn fallback_takes_most_recent_non_self() {
        let records = vec![
            rec("A", "one", 1),
            rec("B", "two", 2),
            rec("C", "three", 3),
            rec("D", "four", 4),
            rec("self", "mine", 5),
        ];
        let out = filter().recent_fallback(&ctx(), &records, 2);
        assert_eq!(
            summary(&out),
            vec![
                ("C".into(), "three".into(), Some(3)),
                ("D".into(), "four".into(), Some(4)),
            ]
        );
    }

    #[test]
    fn fallback_with_fewer_records_returns_all() {
        let out = filter().recent_fallback(&ctx(), &sample(), 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let records = vec![
            RawRecord {
                sender: None,
                content: Some("who said this".into()),
                key: Some(OrderingKey(1)),
            },
            RawRecord {
                sender: Some("A".into()),
                content: None,
                key: Some(OrderingKey(2)),
            },
            rec("B", "   ", 3),
        ];
        let out = filter().candidates(&ctx(), &records);
        assert_eq!(
            summary(&out),
            vec![(UNKNOWN_SENDER.into(), "who said this".into(), Some(1))]
        );
    }

    #[test]
    fn unkeyed_records_bypass_cursor_but_not_identity() {
        let records = vec![
            rec("A", "old", 1),
            unkeyed("B", "no key"),
            unkeyed("self", "mine, no key"),
        ];
        let out = filter().filter_new(&ctx(), &records, Some(OrderingKey(5)), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "no key");
        assert!(matches!(out[0].key, MessageKey::Synthetic(_)));
    }

    #[test]
    fn out_of_order_keys_are_sorted_with_unkeyed_following_predecessor() {
        let records = vec![
            rec("A", "late", 5),
            unkeyed("B", "after late"),
            rec("C", "early", 2),
            unkeyed("D", "after early"),
        ];
        let out = filter().candidates(&ctx(), &records);
        let contents: Vec<_> = out.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["early", "after early", "late", "after late"]);
    }

    #[test]
    fn leading_unkeyed_record_sorts_first() {
        let records = vec![unkeyed("A", "first"), rec("B", "second", 1)];
        let out = filter().candidates(&ctx(), &records);
        assert_eq!(out[0].content, "first");
    }

    #[test]
    fn self_key_and_high_water() {
        let f = filter();
        assert_eq!(f.last_self_key(&sample()), Some(OrderingKey(2)));
        assert_eq!(f.high_water(&sample()), Some(OrderingKey(3)));
        assert_eq!(f.last_self_key(&[rec("A", "x", 1)]), None);
        assert_eq!(f.high_water(&[unkeyed("A", "x")]), None);
    }

    #[test]
    fn messages_carry_context_id() {
        let thread = Context::new("C1", true);
        let out = filter().candidates(&thread, &sample());
        assert!(out.iter().all(|m| m.context_id == "C1#thread"));
    }

    fn arb_record() -> impl Strategy<Value = RawRecord> {
        (
            prop_oneof![Just("self"), Just("alice"), Just("bob")],
            "[a-z ]{0,6}",
            proptest::option::of(0i64..50),
        )
            .prop_map(|(sender, content, key)| RawRecord::new(sender, content, key.map(OrderingKey)))
    }

    proptest! {
        #[test]
        fn self_messages_never_pass(
            records in proptest::collection::vec(arb_record(), 0..40),
            cursor in proptest::option::of(0i64..50),
            boundary in proptest::option::of(0i64..50),
        ) {
            let out = filter().filter_new(
                &ctx(),
                &records,
                cursor.map(OrderingKey),
                boundary.map(OrderingKey),
            );
            prop_assert!(out.iter().all(|m| m.sender != "self"));
        }

        #[test]
        fn keyed_output_is_sorted(
            records in proptest::collection::vec(arb_record(), 0..40),
            cursor in proptest::option::of(0i64..50),
        ) {
            let out = filter().filter_new(&ctx(), &records, cursor.map(OrderingKey), None);
            let keys: Vec<_> = out.iter().filter_map(Message::ordering_key).collect();
            prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
            if let Some(cursor) = cursor {
                prop_assert!(keys.iter().all(|k| k.0 > cursor));
            }
        }

        #[test]
        fn ascending_snapshot_keeps_scan_order(
            rows in proptest::collection::vec(
                (prop_oneof![Just("self"), Just("alice"), Just("bob")], "[a-z]{1,6}", any::<bool>()),
                0..40,
            ),
        ) {
            let records: Vec<RawRecord> = rows
                .iter()
                .enumerate()
                .map(|(i, (sender, content, keyed))| {
                    RawRecord::new(*sender, content.clone(), keyed.then_some(OrderingKey(i as i64)))
                })
                .collect();

            let out = filter().candidates(&ctx(), &records);
            let got: Vec<_> = out.iter().map(|m| (m.sender.clone(), m.content.clone())).collect();
            let expected: Vec<_> = rows
                .iter()
                .filter(|(sender, _, _)| *sender != "self")
                .map(|(sender, content, _)| (sender.to_string(), content.clone()))
                .collect();
            prop_assert_eq!(got, expected);
        }
    }
}
