// Copyright (c) 2026 Murmur Contributors. MIT License.
// See LICENSE for details.

//! # Murmur Broadcast Node
//!
//! Entry point for the `murmur-node` binary. Parses CLI arguments,
//! initializes logging (stderr only — stdout is the wire), assembles the
//! broadcast engine, and runs the stdin session until EOF or a signal.
//!
//! The session is the whole lifecycle: a harness hands the node its
//! identity via `init`, pushes a `topology` assignment, and from then on
//! `broadcast`/`read` requests and peer traffic flow until the input
//! closes. On the way out the engine joins its retry tasks and the writer
//! drains whatever replies are still queued.

mod cli;
mod logging;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::mpsc;

use murmur_protocol::broadcast::{AckTracker, GossipEngine, TopologyView, ValueStore};
use murmur_protocol::config;
use murmur_protocol::message::Envelope;

use cli::NodeCli;
use logging::LogFormat;
use transport::{write_outbound, Dispatcher, WireSender};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NodeCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));

    tracing::info!(
        version = config::PROTOCOL_VERSION,
        retry_interval_ms = cli.retry_interval_ms,
        "starting murmur-node"
    );

    // --- Outbound wire ---
    let (outbound_tx, outbound_rx) = mpsc::channel::<Envelope>(config::OUTBOUND_QUEUE_CAPACITY);
    let writer = tokio::spawn(write_outbound(outbound_rx, tokio::io::stdout()));

    // --- Broadcast core ---
    let sender = Arc::new(WireSender::new(outbound_tx));
    let store = Arc::new(ValueStore::new());
    let topology = Arc::new(TopologyView::new());
    let tracker = Arc::new(AckTracker::new());
    let engine = Arc::new(GossipEngine::new(
        Arc::clone(&sender),
        store,
        topology,
        tracker,
        Duration::from_millis(cli.retry_interval_ms),
    ));

    // --- Session ---
    let dispatcher = Dispatcher::new(Arc::clone(&sender), Arc::clone(&engine));
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = dispatcher.run(stdin) => match result {
            Ok(()) => tracing::info!("stdin closed, session over"),
            Err(error) => tracing::error!(%error, "session failed"),
        },
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    // Join the retry tasks, then release every queue handle so the writer
    // can drain the remaining envelopes and exit.
    engine.shutdown().await;
    drop(dispatcher);
    drop(engine);
    drop(sender);
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(%error, "writer exited with error"),
        Err(error) => tracing::warn!(%error, "writer task failed"),
    }

    tracing::info!("murmur-node stopped");
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
