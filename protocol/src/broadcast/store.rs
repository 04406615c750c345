//! Deduplicating store of observed values.
//!
//! The single source of truth for "have we seen this before." Grows
//! monotonically — there is deliberately no removal operation, because a
//! forgotten value would be re-propagated on the next duplicate delivery.

use dashmap::DashSet;

use crate::message::Value;

/// Concurrent set of every value this node has observed.
///
/// `DashSet` gives us lock-free reads and an atomic insert, which is all
/// the contract needs: `add` is the check-and-set whose result gates
/// fan-out, and it must stay correct when duplicate deliveries of the same
/// value race in from several peers at once.
#[derive(Debug, Default)]
pub struct ValueStore {
    seen: DashSet<Value>,
}

impl ValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value`. Returns `true` iff it was absent and is now
    /// present — exactly one caller wins when deliveries race.
    pub fn add(&self, value: Value) -> bool {
        self.seen.insert(value)
    }

    /// Whether `value` has been observed.
    pub fn contains(&self, value: Value) -> bool {
        self.seen.contains(&value)
    }

    /// Unordered snapshot of everything observed so far, for `read`.
    pub fn snapshot(&self) -> Vec<Value> {
        self.seen.iter().map(|v| *v).collect()
    }

    /// Number of distinct values observed.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reports_novelty_exactly_once() {
        let store = ValueStore::new();

        assert!(store.add(5));
        assert!(!store.add(5));
        assert!(store.contains(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_reflects_distinct_values() {
        let store = ValueStore::new();
        for v in [3, 7, 3, 9] {
            store.add(v);
        }

        let mut snapshot = store.snapshot();
        snapshot.sort_unstable();
        assert_eq!(snapshot, vec![3, 7, 9]);
    }

    #[test]
    fn racing_adds_of_same_value_elect_one_winner() {
        let store = ValueStore::new();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| store.add(77))).collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|&won| won)
                .count();
            // Exactly one thread may observe the value as new.
            assert_eq!(winners, 1);
        });

        assert_eq!(store.len(), 1);
    }
}
