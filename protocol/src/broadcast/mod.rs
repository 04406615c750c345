//! # Broadcast Engine
//!
//! Flood gossip with acknowledgment-driven retransmission. When a node
//! receives a value it has not seen, it stores it, forwards it to every
//! topology neighbor except the immediate sender, and keeps resending on a
//! fixed cadence until each of those neighbors has acknowledged receipt.
//!
//! ## Architecture
//!
//! ```text
//! store.rs     — ValueStore: deduplicating monotone set, the novelty oracle
//! topology.rs  — TopologyView: wholesale-replaceable neighbor list
//! ack.rs       — AckTracker: per-propagation pending-neighbor bookkeeping
//! engine.rs    — GossipEngine: reception, fan-out, and the retry tasks
//! ```
//!
//! ## Design Decisions
//!
//! - Dedup precedes fan-out. `ValueStore::add` is an atomic check-and-set
//!   and its novelty bit is the *single* trigger for propagation, so a
//!   value re-delivered from a second source can never fan out twice.
//! - The pending set per propagation is a real set, not a single slot.
//!   With more than one neighbor, a one-slot scheme silently tracks only
//!   the last-registered peer and loses the rest.
//! - One supervised retry task per propagation instance. The task's
//!   lifetime is exactly the lifetime of its non-empty pending set, and
//!   shutdown joins whatever is still running — no orphaned timers.
//! - A topology update replaces the neighbor list wholesale and affects
//!   only values seen afterwards. Propagations already in flight keep
//!   retrying their registered peers; sends to ids no longer in the
//!   topology are wasted, not wrong.

pub mod ack;
pub mod engine;
pub mod store;
pub mod topology;

pub use ack::AckTracker;
pub use engine::{GossipEngine, Transport};
pub use store::ValueStore;
pub use topology::TopologyView;
