//! # Protocol Configuration & Constants
//!
//! Every magic number in murmur lives in this file. A constant hardcoded
//! anywhere else is a bug report waiting to be filed.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string, reported by the node binary. Bump on wire
/// format changes; the line protocol has no version negotiation, so old
/// and new nodes simply must not be mixed.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Cadence between retransmission rounds for a propagation that still has
/// unacknowledged neighbors. Fixed — no backoff, no cap. A second is slow
/// enough not to flood a lossy link and fast enough that convergence is
/// measured in single-digit retries.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Retry cadence as milliseconds — because CLI parsers want a u64, not a
/// Duration. Keep in sync with [`RETRY_INTERVAL`] or the sanity test bites.
pub const RETRY_INTERVAL_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Transport Parameters
// ---------------------------------------------------------------------------

/// Capacity of the outbound envelope queue feeding the writer task.
/// Deep enough to absorb a full fan-out burst plus a retry round for every
/// in-flight value; if it fills, senders block and that backpressure is
/// exactly what we want.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1_024;

/// First message id a node allocates. Zero is reserved so that "no id"
/// never collides with a real one in logs or correlation tables.
pub const FIRST_MSG_ID: u64 = 1;
