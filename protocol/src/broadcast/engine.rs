//! # Gossip Engine
//!
//! Orchestrates the whole broadcast flow: reception of a value, the dedup
//! gate, fan-out to neighbors, acknowledgment bookkeeping, and the
//! fixed-cadence retransmission that makes delivery survive message loss.
//!
//! ## How a propagation works
//!
//! 1. A `broadcast` of value `v` arrives from `src`. (The caller has
//!    already acknowledged `src` — acking is unconditional and happens
//!    before novelty is even considered.)
//! 2. `ValueStore::add(v)` is the gate. If `v` is already known, stop:
//!    no fan-out, no bookkeeping. This is what makes duplicate delivery
//!    from any number of sources idempotent.
//! 3. Otherwise compute the target set — current neighbors minus `src` —
//!    register it with the [`AckTracker`], and send `v` to every target.
//! 4. A retry task takes over: every [`retry_interval`](GossipEngine::retry_interval)
//!    it resends `v` to whichever targets have still not acknowledged,
//!    using a fresh snapshot each round. No backoff, no retry cap, no
//!    failure declaration — an unresponsive peer is retried forever.
//! 5. The task retires the moment its pending set empties. Shutdown
//!    signals every task and joins them, so nothing outlives the engine.
//!
//! Each propagation's task is independent; values acknowledge out of
//! order relative to arrival and nobody cares. Send failures are treated
//! exactly like loss on the wire — logged, absorbed, retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::broadcast::{AckTracker, TopologyView, ValueStore};
use crate::error::ProtocolError;
use crate::message::{NodeId, Value};

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Outbound half of the transport collaborator.
///
/// The engine never touches sockets or message ids; it hands a peer and a
/// value to the transport and moves on. The transport owns id allocation
/// and reply correlation, which is also why the engine's ack path receives
/// a value rather than a message id.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver a `broadcast` of `value` to `peer`, best effort. A failure
    /// here is indistinguishable from loss on the wire and the caller's
    /// retry cadence absorbs it.
    async fn send_broadcast(&self, peer: &NodeId, value: Value) -> Result<(), ProtocolError>;
}

// ---------------------------------------------------------------------------
// GossipEngine
// ---------------------------------------------------------------------------

/// The broadcast orchestrator for one node.
///
/// Owns shared references to the store, topology view, and ack tracker;
/// all three are mutated concurrently by inbound-message handlers and the
/// per-propagation retry tasks. The engine itself is shared behind an
/// `Arc` by whatever dispatch layer feeds it.
pub struct GossipEngine<T: Transport> {
    /// Outbound transport half.
    transport: Arc<T>,
    /// Dedup oracle; its `add` gates fan-out.
    store: Arc<ValueStore>,
    /// Current neighbor assignment.
    topology: Arc<TopologyView>,
    /// Pending-acknowledgment bookkeeping.
    tracker: Arc<AckTracker>,
    /// Fixed cadence between retransmission rounds.
    retry_interval: Duration,
    /// Shutdown signal fanned out to every retry task.
    shutdown_tx: watch::Sender<bool>,
    /// Template receiver cloned into each spawned task.
    shutdown_rx: watch::Receiver<bool>,
    /// Live retry tasks by value, joined at shutdown. A task removes its
    /// own entry when its pending set empties.
    inflight: Arc<DashMap<Value, JoinHandle<()>>>,
}

impl<T: Transport> GossipEngine<T> {
    /// Wires an engine to its collaborators. Nothing runs until the first
    /// new value arrives.
    pub fn new(
        transport: Arc<T>,
        store: Arc<ValueStore>,
        topology: Arc<TopologyView>,
        tracker: Arc<AckTracker>,
        retry_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            transport,
            store,
            topology,
            tracker,
            retry_interval,
            shutdown_tx,
            shutdown_rx,
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Reception path for a `broadcast` of `value` from `src`.
    ///
    /// The caller must already have acknowledged `src` — the reply is not
    /// conditioned on novelty. Duplicates stop at the store gate; new
    /// values fan out to the current neighbors minus `src` and pick up a
    /// retry task that lives until every target acknowledges.
    pub async fn handle_broadcast(&self, src: &NodeId, value: Value) {
        if !self.store.add(value) {
            trace!(%src, value, "duplicate value, no fan-out");
            return;
        }

        let targets = self.topology.neighbors_excluding(src);
        if targets.is_empty() {
            debug!(value, "new value has no fan-out targets");
            return;
        }

        self.tracker.register(value, targets.iter().cloned());
        debug!(%src, value, targets = targets.len(), "fanning out new value");

        for peer in &targets {
            if let Err(error) = self.transport.send_broadcast(peer, value).await {
                warn!(%peer, value, %error, "initial send failed, retry round will cover it");
            }
        }

        self.spawn_retry(value);
    }

    /// Acknowledgment path: `from` has confirmed receipt of `value`.
    ///
    /// Stale and duplicate acknowledgments fall through the tracker as
    /// no-ops; no reply is ever sent for an acknowledgment.
    pub fn handle_ack(&self, value: Value, from: &NodeId) {
        trace!(%from, value, "acknowledgment");
        self.tracker.acknowledge(value, from);
    }

    /// Everything this node has observed, unordered.
    pub fn read(&self) -> Vec<Value> {
        self.store.snapshot()
    }

    /// Replaces the neighbor list wholesale. Propagations already in
    /// flight keep their registered targets.
    pub fn update_topology(&self, neighbors: Vec<NodeId>) {
        info!(neighbors = neighbors.len(), "topology replaced");
        self.topology.set(neighbors);
    }

    /// The configured retransmission cadence.
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Number of propagations whose retry task is still alive.
    pub fn active_propagations(&self) -> usize {
        self.inflight.len()
    }

    /// Signals every retry task and joins them.
    ///
    /// After this returns no task owned by the engine is running. Values
    /// still unacknowledged at shutdown are simply abandoned — durability
    /// across restarts is explicitly not on offer.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let keys: Vec<Value> = self.inflight.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, handle)) = self.inflight.remove(&key) {
                if let Err(error) = handle.await {
                    if !error.is_cancelled() {
                        warn!(value = key, %error, "retry task panicked");
                    }
                }
            }
        }
    }

    /// Spawns the supervised retry task for one propagation instance.
    ///
    /// Loop shape: check the pending set, sleep one cadence (racing the
    /// shutdown signal), resend to a fresh snapshot of whoever is left.
    /// The snapshot may shrink between rounds, may contain ids a topology
    /// update has since dropped, and may already be empty — all fine.
    fn spawn_retry(&self, value: Value) {
        let transport = Arc::clone(&self.transport);
        let tracker = Arc::clone(&self.tracker);
        let inflight = Arc::clone(&self.inflight);
        let mut shutdown = self.shutdown_rx.clone();
        let interval = self.retry_interval;

        let handle = tokio::spawn(async move {
            loop {
                if tracker.is_empty(value) {
                    trace!(value, "all neighbors acknowledged, retiring retry task");
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {}
                }
                if *shutdown.borrow() {
                    break;
                }

                let pending = tracker.pending(value);
                trace!(value, pending = pending.len(), "retransmission round");
                for peer in &pending {
                    if let Err(error) = transport.send_broadcast(peer, value).await {
                        warn!(%peer, value, %error, "retransmission failed");
                    }
                }
            }
            inflight.remove(&value);
        });

        self.inflight.insert(value, handle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
