//! This node's view of its neighbor assignment.
//!
//! The topology is supplied from outside, never derived. Updates replace
//! the whole list atomically; readers always see either the old list or
//! the new one, never a splice of both.

use parking_lot::RwLock;

use crate::message::NodeId;

/// The current neighbor list, replaceable wholesale.
///
/// A replacement mid-propagation does not retroactively cancel pending
/// acknowledgments registered under the old list — it only changes the
/// target set computed for values seen from then on. That staleness
/// window is part of the contract, not a race to fix.
#[derive(Debug, Default)]
pub struct TopologyView {
    neighbors: RwLock<Vec<NodeId>>,
}

impl TopologyView {
    /// Creates a view with no neighbors. Until the first `topology`
    /// message arrives, new values are stored but fan out nowhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the neighbor list wholesale.
    pub fn set(&self, neighbors: Vec<NodeId>) {
        *self.neighbors.write() = neighbors;
    }

    /// Snapshot of the current neighbor list.
    pub fn get(&self) -> Vec<NodeId> {
        self.neighbors.read().clone()
    }

    /// Fan-out target set for a value received from `src`: the current
    /// neighbors minus the immediate sender. Echoing a value back to
    /// whoever just sent it would be harmless, just wasted bandwidth.
    pub fn neighbors_excluding(&self, src: &NodeId) -> Vec<NodeId> {
        self.neighbors
            .read()
            .iter()
            .filter(|n| *n != src)
            .cloned()
            .collect()
    }

    /// Number of neighbors in the current view.
    pub fn len(&self) -> usize {
        self.neighbors.read().len()
    }

    /// Whether the view has no neighbors.
    pub fn is_empty(&self) -> bool {
        self.neighbors.read().is_empty()
    }
}
