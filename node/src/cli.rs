//! # CLI Interface
//!
//! Defines the command-line argument structure for `murmur-node` using
//! `clap` derive. There are no subcommands: the node is driven entirely
//! by its stdin session, so flags only tune cadence and logging.

use clap::Parser;

/// Murmur gossip broadcast node.
///
/// Speaks the line-delimited JSON protocol on stdin/stdout: an `init`
/// handshake, then `broadcast`/`read`/`topology` requests. Every distinct
/// value broadcast to any node in the cluster eventually reaches every
/// other node, message loss notwithstanding.
#[derive(Parser, Debug)]
#[command(name = "murmur-node", about = "Murmur gossip broadcast node", version)]
pub struct NodeCli {
    /// Milliseconds between retransmission rounds to unacknowledged
    /// neighbors. The cadence is fixed — no backoff, no retry cap.
    #[arg(
        long,
        env = "MURMUR_RETRY_INTERVAL_MS",
        default_value_t = murmur_protocol::config::RETRY_INTERVAL_MS
    )]
    pub retry_interval_ms: u64,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(
        long,
        env = "MURMUR_LOG",
        default_value = "murmur_node=info,murmur_protocol=info"
    )]
    pub log_level: String,

    /// Log output format: "pretty" or "json". Logs go to stderr either
    /// way — stdout belongs to the protocol.
    #[arg(long, env = "MURMUR_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        NodeCli::command().debug_assert();
    }
}
