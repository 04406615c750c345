//! Per-propagation acknowledgment bookkeeping.
//!
//! For every value this node is actively propagating, the tracker holds
//! the set of neighbors that have not yet acknowledged receipt. The retry
//! loop reads snapshots of that set; inbound acknowledgments shrink it;
//! when it empties, the entry is retired and the propagation is done.
//!
//! The pending side of a propagation must be a real set. A single-slot
//! scheme ("the one node we're waiting on") silently drops every neighbor
//! but the last one registered as soon as fan-out targets more than one
//! peer — that is a correctness defect, not a simplification.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::message::{NodeId, Value};

/// Concurrent map from in-flight value to its unacknowledged neighbors.
///
/// Registration, acknowledgment, and snapshot reads interleave freely:
/// acknowledgments race with retransmission rounds and with late duplicate
/// registrations, and `DashMap`'s shard locking serializes the mutations.
/// An acknowledgment for an unknown key — one that arrives before this
/// node believes it sent anything, or after the propagation retired — is
/// a silent no-op, never a fault.
#[derive(Debug, Default)]
pub struct AckTracker {
    entries: DashMap<Value, HashSet<NodeId>>,
}

impl AckTracker {
    /// Creates a tracker with no pending propagations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or merges into) the pending set for `key`.
    ///
    /// Merging makes a late duplicate registration safe: neighbors already
    /// acknowledged stay gone, neighbors still pending stay pending, and
    /// any genuinely new ones start being tracked.
    pub fn register(&self, key: Value, neighbors: impl IntoIterator<Item = NodeId>) {
        let fresh: HashSet<NodeId> = neighbors.into_iter().collect();
        if fresh.is_empty() {
            return;
        }
        self.entries.entry(key).or_default().extend(fresh);
    }

    /// Removes `from` from the pending set for `key`, retiring the entry
    /// once it empties. No-op if the key is unknown or the neighbor has
    /// already acknowledged.
    pub fn acknowledge(&self, key: Value, from: &NodeId) {
        let emptied = match self.entries.get_mut(&key) {
            Some(mut pending) => {
                pending.remove(from);
                pending.is_empty()
            }
            None => return,
        };
        if emptied {
            // Emptiness is re-checked under the shard lock so a racing
            // register cannot be clobbered between our check and removal.
            self.entries.remove_if(&key, |_, pending| pending.is_empty());
        }
    }

    /// Snapshot of the neighbors still pending for `key`. The set may
    /// shrink concurrently; callers treat the snapshot as a hint of whom
    /// to resend to, nothing more.
    pub fn pending(&self, key: Value) -> HashSet<NodeId> {
        self.entries
            .get(&key)
            .map(|pending| pending.clone())
            .unwrap_or_default()
    }

    /// Whether `key` has no unacknowledged neighbors. Unknown keys are
    /// vacuously complete.
    pub fn is_empty(&self, key: Value) -> bool {
        self.entries
            .get(&key)
            .map(|pending| pending.is_empty())
            .unwrap_or(true)
    }

    /// Number of propagations with at least one unacknowledged neighbor.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}
