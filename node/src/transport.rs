//! # Stdin/Stdout Transport
//!
//! The concrete transport collaborator: line-delimited JSON envelopes,
//! one object per line, reads on stdin and writes on stdout. This module
//! owns everything the protocol crate deliberately does not — message-id
//! allocation, reply correlation, the `init` handshake, and per-message
//! dispatch into the engine.
//!
//! ## Outbound path
//!
//! Every producer (reply handlers, fan-out, retry rounds) pushes
//! envelopes into one `mpsc` channel; a single writer task serializes
//! them to the sink. That task is the only thing that ever touches
//! stdout, so interleaved partial lines cannot happen.
//!
//! ## Ack correlation
//!
//! Every transmission of a given value — first send and every retry, to
//! every peer — reuses one stable `msg_id` allocated when the value first
//! fans out. A `broadcast_ok` therefore correlates by `in_reply_to` alone
//! regardless of which retry round prompted it, and the correlation
//! tables grow with distinct values only, mirroring the store's accepted
//! monotone growth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use murmur_protocol::broadcast::Transport;
use murmur_protocol::config;
use murmur_protocol::error::ProtocolError;
use murmur_protocol::message::{Body, Envelope, MsgId, NodeId, Value};
use murmur_protocol::GossipEngine;

// ---------------------------------------------------------------------------
// WireSender — outbound half
// ---------------------------------------------------------------------------

/// Queues envelopes for the writer task and owns id bookkeeping.
///
/// Cheap to share behind an `Arc`; the engine holds one as its
/// [`Transport`] and the dispatcher holds another for replies.
pub struct WireSender {
    /// Outbound envelope queue, drained by [`write_outbound`].
    outbound: mpsc::Sender<Envelope>,
    /// This node's identifier, set once by the `init` handshake.
    node_id: RwLock<Option<NodeId>>,
    /// Next fresh message id.
    next_msg_id: AtomicU64,
    /// Stable propagation id per value, reused across retries.
    propagation_ids: DashMap<Value, MsgId>,
    /// Reverse index resolving `in_reply_to` back to a value.
    by_msg_id: DashMap<MsgId, Value>,
}

impl WireSender {
    /// Wraps the outbound queue.
    pub fn new(outbound: mpsc::Sender<Envelope>) -> Self {
        Self {
            outbound,
            node_id: RwLock::new(None),
            next_msg_id: AtomicU64::new(config::FIRST_MSG_ID),
            propagation_ids: DashMap::new(),
            by_msg_id: DashMap::new(),
        }
    }

    /// Records the identifier assigned by `init`.
    pub fn set_node_id(&self, id: NodeId) {
        *self.node_id.write() = Some(id);
    }

    /// This node's identifier, if the handshake has happened.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id.read().clone()
    }

    /// Resolves an inbound `in_reply_to` to the value it acknowledges.
    /// Entries are never removed: acknowledgments from several peers
    /// share the propagation id, so first-ack removal would orphan the
    /// rest.
    pub fn correlate(&self, msg_id: MsgId) -> Option<Value> {
        self.by_msg_id.get(&msg_id).map(|value| *value)
    }

    /// Queues a reply to `request`, echoing its `msg_id` obligations via
    /// the body the caller built.
    pub async fn reply(&self, request: &Envelope, body: Body) -> Result<(), ProtocolError> {
        self.push(request.src.clone(), body).await
    }

    fn next_id(&self) -> MsgId {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The stable message id for every transmission of `value`.
    fn propagation_id(&self, value: Value) -> MsgId {
        match self.propagation_ids.entry(value) {
            Entry::Occupied(occupied) => *occupied.get(),
            Entry::Vacant(vacant) => {
                let id = self.next_id();
                vacant.insert(id);
                self.by_msg_id.insert(id, value);
                id
            }
        }
    }

    async fn push(&self, dest: NodeId, body: Body) -> Result<(), ProtocolError> {
        let src = self.node_id().ok_or(ProtocolError::Uninitialized)?;
        self.outbound
            .send(Envelope::new(src, dest, body))
            .await
            .map_err(|_| ProtocolError::TransportClosed)
    }
}

#[async_trait]
impl Transport for WireSender {
    async fn send_broadcast(&self, peer: &NodeId, value: Value) -> Result<(), ProtocolError> {
        let msg_id = self.propagation_id(value);
        trace!(%peer, value, msg_id, "queueing broadcast");
        self.push(
            peer.clone(),
            Body::Broadcast {
                message: value,
                msg_id,
            },
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

/// Drains the outbound queue into `sink`, one JSON object per line.
///
/// Runs until every [`WireSender`] clone is dropped. Serialization of an
/// envelope we built ourselves cannot realistically fail, but if it does
/// the error propagates rather than silently dropping a message.
pub async fn write_outbound<W>(
    mut outbound: mpsc::Receiver<Envelope>,
    mut sink: W,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = outbound.recv().await {
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        sink.write_all(&line).await?;
        sink.flush().await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatcher — inbound half
// ---------------------------------------------------------------------------

/// Reads envelopes off the session input and routes each to the engine.
pub struct Dispatcher {
    sender: Arc<WireSender>,
    engine: Arc<GossipEngine<WireSender>>,
}

impl Dispatcher {
    /// Wires the dispatcher to its outbound half and engine.
    pub fn new(sender: Arc<WireSender>, engine: Arc<GossipEngine<WireSender>>) -> Self {
        Self { sender, engine }
    }

    /// Runs the session until `input` reaches EOF.
    ///
    /// A line that fails to parse is logged and skipped — the failure is
    /// local to that message and no broadcast state has been touched.
    pub async fn run<R>(&self, input: R) -> Result<(), ProtocolError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Envelope>(&line) {
                Ok(envelope) => self.dispatch(envelope).await,
                Err(error) => warn!(%error, "discarding malformed message"),
            }
        }
        Ok(())
    }

    /// Routes one inbound envelope.
    async fn dispatch(&self, envelope: Envelope) {
        match envelope.body.clone() {
            Body::Init {
                msg_id,
                node_id,
                node_ids,
            } => {
                self.sender.set_node_id(node_id.clone());
                info!(%node_id, cluster = node_ids.len(), "node initialized");
                self.reply_or_log(&envelope, Body::InitOk {
                    in_reply_to: msg_id,
                })
                .await;
            }

            Body::Broadcast { message, msg_id } => {
                // Ack first, unconditionally — the reply is not gated on
                // novelty, and acking a duplicate is idempotent for the
                // sender.
                self.reply_or_log(&envelope, Body::BroadcastOk {
                    in_reply_to: msg_id,
                })
                .await;
                self.engine.handle_broadcast(&envelope.src, message).await;
            }

            Body::BroadcastOk { in_reply_to } => match self.sender.correlate(in_reply_to) {
                Some(value) => self.engine.handle_ack(value, &envelope.src),
                None => trace!(in_reply_to, src = %envelope.src, "stale acknowledgment ignored"),
            },

            Body::Read { msg_id } => {
                let messages = self.engine.read();
                debug!(count = messages.len(), "read served");
                self.reply_or_log(&envelope, Body::ReadOk {
                    messages,
                    in_reply_to: msg_id,
                })
                .await;
            }

            Body::Topology { mut topology, msg_id } => {
                let neighbors = self
                    .sender
                    .node_id()
                    .and_then(|id| topology.remove(&id))
                    .unwrap_or_default();
                self.engine.update_topology(neighbors);
                self.reply_or_log(&envelope, Body::TopologyOk {
                    in_reply_to: msg_id,
                })
                .await;
            }

            Body::InitOk { .. } | Body::ReadOk { .. } | Body::TopologyOk { .. } => {
                trace!(src = %envelope.src, "ignoring reply-only message");
            }
        }
    }

    async fn reply_or_log(&self, request: &Envelope, body: Body) {
        if let Err(error) = self.sender.reply(request, body).await {
            warn!(%error, src = %request.src, "failed to queue reply");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::BufReader;

    use murmur_protocol::broadcast::{AckTracker, TopologyView, ValueStore};

    struct TestNode {
        sender: Arc<WireSender>,
        engine: Arc<GossipEngine<WireSender>>,
        dispatcher: Dispatcher,
        outbound: mpsc::Receiver<Envelope>,
        tracker: Arc<AckTracker>,
    }

    /// Full node wiring minus real stdio. The retry interval is an hour
    /// so retransmission never interferes with scripted sessions.
    fn setup() -> TestNode {
        let (outbound_tx, outbound) = mpsc::channel(config::OUTBOUND_QUEUE_CAPACITY);
        let sender = Arc::new(WireSender::new(outbound_tx));
        let store = Arc::new(ValueStore::new());
        let topology = Arc::new(TopologyView::new());
        let tracker = Arc::new(AckTracker::new());
        let engine = Arc::new(GossipEngine::new(
            Arc::clone(&sender),
            store,
            topology,
            Arc::clone(&tracker),
            Duration::from_secs(3_600),
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&sender), Arc::clone(&engine));

        TestNode {
            sender,
            engine,
            dispatcher,
            outbound,
            tracker,
        }
    }

    async fn drive(node: &TestNode, script: &[&str]) {
        let input = script.join("\n");
        node.dispatcher
            .run(BufReader::new(input.as_bytes()))
            .await
            .expect("scripted session should not fail");
    }

    fn drain(node: &mut TestNode) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = node.outbound.try_recv() {
            out.push(envelope);
        }
        out
    }

    const INIT: &str =
        r#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":1,"node_id":"n1","node_ids":["n1","n2","n3"]}}"#;
    const TOPOLOGY: &str = r#"{"src":"c0","dest":"n1","body":{"type":"topology","msg_id":2,"topology":{"n1":["n2","n3"],"n2":["n1"],"n3":["n1"]}}}"#;

    // -----------------------------------------------------------------------
    // 1. Init handshake sets identity and replies init_ok
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn init_sets_identity_and_replies() {
        let mut node = setup();

        drive(&node, &[INIT]).await;

        assert_eq!(node.sender.node_id(), Some(NodeId::from("n1")));

        let out = drain(&mut node);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].src, NodeId::from("n1"));
        assert_eq!(out[0].dest, NodeId::from("c0"));
        assert!(matches!(out[0].body, Body::InitOk { in_reply_to: 1 }));
    }

    // -----------------------------------------------------------------------
    // 2. Broadcast is acked first, then fanned out under one msg_id
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn broadcast_is_acked_then_fanned_out() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            TOPOLOGY,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":42,"msg_id":5}}"#,
        ])
        .await;

        let out = drain(&mut node);
        // init_ok, topology_ok, broadcast_ok, then two peer broadcasts.
        assert_eq!(out.len(), 5);
        assert!(matches!(out[2].body, Body::BroadcastOk { in_reply_to: 5 }));
        assert_eq!(out[2].dest, NodeId::from("c1"));

        let fanned: Vec<(&NodeId, MsgId)> = out[3..]
            .iter()
            .map(|envelope| match envelope.body {
                Body::Broadcast { message, msg_id } => {
                    assert_eq!(message, 42);
                    (&envelope.dest, msg_id)
                }
                ref other => panic!("expected broadcast, got {:?}", other),
            })
            .collect();

        let dests: Vec<&NodeId> = fanned.iter().map(|(dest, _)| *dest).collect();
        assert!(dests.contains(&&NodeId::from("n2")));
        assert!(dests.contains(&&NodeId::from("n3")));
        // Every transmission of a value shares one propagation id.
        assert_eq!(fanned[0].1, fanned[1].1);

        node.engine.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // 3. A peer's broadcast_ok correlates back to the pending set
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn peer_ack_correlates_to_pending_set() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            TOPOLOGY,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":42,"msg_id":5}}"#,
        ])
        .await;

        let out = drain(&mut node);
        let propagation_id = out
            .iter()
            .find_map(|envelope| match envelope.body {
                Body::Broadcast { msg_id, .. } => Some(msg_id),
                _ => None,
            })
            .expect("fan-out should have been queued");

        let ack = format!(
            r#"{{"src":"n2","dest":"n1","body":{{"type":"broadcast_ok","in_reply_to":{propagation_id}}}}}"#
        );
        drive(&node, &[&ack]).await;

        let expected: std::collections::HashSet<NodeId> =
            [NodeId::from("n3")].into_iter().collect();
        assert_eq!(node.tracker.pending(42), expected);

        node.engine.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // 4. Duplicate broadcast is still acked but never re-fanned
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn duplicate_broadcast_is_acked_but_not_refanned() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            TOPOLOGY,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":42,"msg_id":5}}"#,
            r#"{"src":"n3","dest":"n1","body":{"type":"broadcast","message":42,"msg_id":9}}"#,
        ])
        .await;

        let out = drain(&mut node);
        let acks = out
            .iter()
            .filter(|envelope| matches!(envelope.body, Body::BroadcastOk { .. }))
            .count();
        let broadcasts = out
            .iter()
            .filter(|envelope| matches!(envelope.body, Body::Broadcast { .. }))
            .count();

        assert_eq!(acks, 2, "both deliveries are acknowledged");
        assert_eq!(broadcasts, 2, "only the first delivery fans out");

        node.engine.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // 5. Read returns everything stored, in_reply_to correlated
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn read_returns_stored_values() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":3,"msg_id":2}}"#,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":7,"msg_id":3}}"#,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":3,"msg_id":4}}"#,
            r#"{"src":"c2","dest":"n1","body":{"type":"read","msg_id":9}}"#,
        ])
        .await;

        let out = drain(&mut node);
        let read_ok = out
            .iter()
            .find_map(|envelope| match &envelope.body {
                Body::ReadOk {
                    messages,
                    in_reply_to,
                } => Some((messages.clone(), *in_reply_to)),
                _ => None,
            })
            .expect("read_ok should have been queued");

        let mut messages = read_ok.0;
        messages.sort_unstable();
        assert_eq!(messages, vec![3, 7]);
        assert_eq!(read_ok.1, 9);
    }

    // -----------------------------------------------------------------------
    // 6. Malformed lines are skipped, the session keeps going
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn malformed_line_is_local_to_itself() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            "this is not json",
            r#"{"src":"c1","dest":"n1","body":{"type":"cas","msg_id":1}}"#,
            r#"{"src":"c2","dest":"n1","body":{"type":"read","msg_id":4}}"#,
        ])
        .await;

        let out = drain(&mut node);
        assert!(
            out.iter()
                .any(|envelope| matches!(envelope.body, Body::ReadOk { .. })),
            "messages after the malformed ones are still served"
        );
    }

    // -----------------------------------------------------------------------
    // 7. A stale ack resolves to nothing and is dropped quietly
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stale_ack_is_dropped() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            r#"{"src":"n2","dest":"n1","body":{"type":"broadcast_ok","in_reply_to":999}}"#,
        ])
        .await;

        let out = drain(&mut node);
        assert_eq!(out.len(), 1, "only the init_ok goes out");
        assert_eq!(node.tracker.tracked(), 0);
    }

    // -----------------------------------------------------------------------
    // 8. A topology without our entry leaves the node with no neighbors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn topology_without_our_entry_means_no_neighbors() {
        let mut node = setup();

        drive(&node, &[
            INIT,
            r#"{"src":"c0","dest":"n1","body":{"type":"topology","msg_id":2,"topology":{"n2":["n3"]}}}"#,
            r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":8,"msg_id":3}}"#,
        ])
        .await;

        let out = drain(&mut node);
        let broadcasts = out
            .iter()
            .filter(|envelope| matches!(envelope.body, Body::Broadcast { .. }))
            .count();
        assert_eq!(broadcasts, 0);
        assert_eq!(node.engine.read(), vec![8]);
    }

    // -----------------------------------------------------------------------
    // 9. The writer emits one JSON object per line
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn writer_emits_line_delimited_json() {
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let (sink, readback) = tokio::io::duplex(4_096);
        let writer = tokio::spawn(write_outbound(outbound_rx, sink));

        outbound_tx
            .send(Envelope::new(
                NodeId::from("n1"),
                NodeId::from("c1"),
                Body::InitOk { in_reply_to: 1 },
            ))
            .await
            .unwrap();
        outbound_tx
            .send(Envelope::new(
                NodeId::from("n1"),
                NodeId::from("c1"),
                Body::BroadcastOk { in_reply_to: 2 },
            ))
            .await
            .unwrap();
        drop(outbound_tx);
        writer.await.unwrap().unwrap();

        let mut lines = BufReader::new(readback).lines();
        let first: Envelope =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(first.body, Body::InitOk { in_reply_to: 1 }));
        let second: Envelope =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(second.body, Body::BroadcastOk { in_reply_to: 2 }));
    }

    // -----------------------------------------------------------------------
    // 10. Nothing can be sent before init supplies an identity
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sends_before_init_are_rejected() {
        let node = setup();

        let result = node
            .sender
            .send_broadcast(&NodeId::from("n2"), 1)
            .await;
        assert!(matches!(result, Err(ProtocolError::Uninitialized)));
    }
}
