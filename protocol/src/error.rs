//! Error types for the murmur broadcast core.
//!
//! The taxonomy is deliberately short. A malformed inbound payload fails
//! the handler for that one message; a stale acknowledgment is silently
//! ignored; a failed send is indistinguishable from loss and absorbed by
//! the retry cadence. Nothing in this crate escalates to a crash.

use thiserror::Error;

/// Errors surfaced by the broadcast core and the transport seam.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An inbound line could not be parsed into an [`crate::Envelope`],
    /// or an outbound envelope could not be serialized. Local to the
    /// offending message — no broadcast state is mutated.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A send or reply was attempted before the `init` handshake supplied
    /// this node's identifier.
    #[error("node has not completed the init handshake")]
    Uninitialized,

    /// The outbound envelope queue is gone, meaning the writer task has
    /// exited. Only reachable during shutdown.
    #[error("outbound transport channel closed")]
    TransportClosed,

    /// The writer failed to push bytes to its sink.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
