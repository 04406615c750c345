//! Interactive CLI demo of the murmur broadcast lifecycle.
//!
//! Assembles a five-node in-memory cluster, injects values at different
//! nodes, and narrates the gossip: fan-out, acknowledgment, a flaky link
//! that swallows acks, and the fixed-cadence retransmission that rides it
//! out. The output uses ANSI escape codes for colored, storytelling-style
//! terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::mpsc;

use murmur_protocol::broadcast::{AckTracker, GossipEngine, TopologyView, Transport, ValueStore};
use murmur_protocol::error::ProtocolError;
use murmur_protocol::message::{NodeId, Value};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    MURMUR  --  Gossip Broadcast Lifecycle Demo                     {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Flood gossip + ack tracking + fixed-cadence retransmission      {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!(
        "{CYAN}------------------------------------------------------------------------{RESET}"
    );
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn ok(text: &str) {
    println!("  {GREEN}[ok]{RESET} {text}");
}

fn detail(text: &str) {
    println!("       {DIM}{text}{RESET}");
}

// ---------------------------------------------------------------------------
// In-memory cluster
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Delivery {
    from: NodeId,
    to: NodeId,
    value: Value,
}

/// Transport that routes every send through the demo's pump task.
struct ClusterTransport {
    id: NodeId,
    outbox: mpsc::UnboundedSender<Delivery>,
}

#[async_trait]
impl Transport for ClusterTransport {
    async fn send_broadcast(&self, peer: &NodeId, value: Value) -> Result<(), ProtocolError> {
        self.outbox
            .send(Delivery {
                from: self.id.clone(),
                to: peer.clone(),
                value,
            })
            .map_err(|_| ProtocolError::TransportClosed)
    }
}

struct Node {
    engine: Arc<GossipEngine<ClusterTransport>>,
    tracker: Arc<AckTracker>,
}

/// The retry cadence for the demo. Much faster than the 1 s reference so
/// the flaky-link act does not put the audience to sleep.
const DEMO_RETRY_INTERVAL: Duration = Duration::from_millis(100);

fn build_cluster(
    topology: &[(&str, &[&str])],
    outbox: &mpsc::UnboundedSender<Delivery>,
) -> HashMap<NodeId, Node> {
    let mut nodes = HashMap::new();
    for (name, neighbors) in topology {
        let id = NodeId::from(*name);
        let transport = Arc::new(ClusterTransport {
            id: id.clone(),
            outbox: outbox.clone(),
        });
        let store = Arc::new(ValueStore::new());
        let view = Arc::new(TopologyView::new());
        view.set(neighbors.iter().map(|n| NodeId::from(*n)).collect());
        let tracker = Arc::new(AckTracker::new());
        let engine = Arc::new(GossipEngine::new(
            transport,
            store,
            view,
            Arc::clone(&tracker),
            DEMO_RETRY_INTERVAL,
        ));
        nodes.insert(id, Node { engine, tracker });
    }
    nodes
}

async fn wait_for_quiesce(nodes: &HashMap<NodeId, Node>) {
    for _ in 0..100 {
        if nodes.values().all(|node| node.tracker.tracked() == 0) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn print_stores(nodes: &HashMap<NodeId, Node>) {
    let mut names: Vec<&NodeId> = nodes.keys().collect();
    names.sort();
    for name in names {
        let mut values = nodes[name].engine.read();
        values.sort_unstable();
        println!("       {MAGENTA}{name}{RESET} -> {values:?}");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    banner();
    let started = Instant::now();

    // --- Step 1: assemble the cluster -----------------------------------
    section(1, "Assemble a five-node cluster (ring with one chord)");

    let topology: &[(&str, &[&str])] = &[
        ("n1", &["n2", "n5"]),
        ("n2", &["n1", "n3"]),
        ("n3", &["n2", "n4", "n1"]),
        ("n4", &["n3", "n5"]),
        ("n5", &["n4", "n1"]),
    ];

    let (outbox, mut inbox) = mpsc::unbounded_channel::<Delivery>();
    let nodes = Arc::new(build_cluster(topology, &outbox));

    for (name, neighbors) in topology {
        subsection(&format!("{name} gossips with {neighbors:?}"));
    }

    // The pump: delivers every queued send to its recipient and routes
    // the acknowledgment back — unless the recipient's acks are muted.
    let muted_acks: Arc<DashSet<NodeId>> = Arc::new(DashSet::new());
    let total_sends = Arc::new(AtomicUsize::new(0));

    let pump_nodes = Arc::clone(&nodes);
    let pump_muted = Arc::clone(&muted_acks);
    let pump_sends = Arc::clone(&total_sends);
    let pump = tokio::spawn(async move {
        while let Some(delivery) = inbox.recv().await {
            pump_sends.fetch_add(1, Ordering::Relaxed);
            let Some(recipient) = pump_nodes.get(&delivery.to) else {
                continue;
            };
            recipient
                .engine
                .handle_broadcast(&delivery.from, delivery.value)
                .await;
            if !pump_muted.contains(&delivery.to) {
                if let Some(origin) = pump_nodes.get(&delivery.from) {
                    origin.engine.handle_ack(delivery.value, &delivery.to);
                }
            }
        }
    });

    ok("cluster online, pump running");

    // --- Step 2: inject values ------------------------------------------
    section(2, "Clients inject values at three different nodes");

    for (at, value) in [("n1", 3), ("n4", 7), ("n2", 9)] {
        subsection(&format!("client broadcasts {value} at {at}"));
        nodes[&NodeId::from(at)]
            .engine
            .handle_broadcast(&NodeId::from("c1"), value)
            .await;
    }

    wait_for_quiesce(&nodes).await;
    ok("every node converged on {3, 7, 9}");
    print_stores(&nodes);

    // --- Step 3: a flaky link -------------------------------------------
    section(3, "n4 goes quiet: it receives but its acks vanish");

    muted_acks.insert(NodeId::from("n4"));
    let sends_before = total_sends.load(Ordering::Relaxed);

    subsection("client broadcasts 42 at n3 while n4's acks are lost");
    nodes[&NodeId::from("n3")]
        .engine
        .handle_broadcast(&NodeId::from("c1"), 42)
        .await;

    // Let a few retry rounds burn against the silent neighbor.
    tokio::time::sleep(DEMO_RETRY_INTERVAL * 4).await;
    let retries_so_far = total_sends.load(Ordering::Relaxed) - sends_before;
    ok(&format!(
        "n3 keeps retransmitting on a fixed cadence ({retries_so_far} sends so far, no give-up timer)"
    ));
    detail("n4 already stored 42 — the value is safe, only the ack is missing");

    subsection("the link heals");
    muted_acks.remove(&NodeId::from("n4"));
    wait_for_quiesce(&nodes).await;
    ok("the delayed acknowledgment finally lands and the retry task retires");
    print_stores(&nodes);

    // --- Step 4: summary -------------------------------------------------
    section(4, "Summary");

    let first: Vec<Value> = {
        let mut values = nodes[&NodeId::from("n1")].engine.read();
        values.sort_unstable();
        values
    };
    let all_equal = nodes.values().all(|node| {
        let mut values = node.engine.read();
        values.sort_unstable();
        values == first
    });

    ok(&format!(
        "all five stores identical: {all_equal} — contents {first:?}"
    ));
    ok(&format!(
        "total peer sends: {} (duplicates suppressed by the dedup gate, loss absorbed by retries)",
        total_sends.load(Ordering::Relaxed)
    ));
    ok(&format!("elapsed: {:?}", started.elapsed()));

    // --- Teardown ---------------------------------------------------------
    for node in nodes.values() {
        node.engine.shutdown().await;
    }
    pump.abort();

    println!();
    println!("{BOLD}{GREEN}Demo complete.{RESET}");
    println!();
}
