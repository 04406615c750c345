//! # Wire Model
//!
//! Envelopes and bodies for the line protocol: one JSON object per line,
//! an outer envelope carrying routing (`src`/`dest`) and an inner body
//! tagged by `type`. Requests carry a `msg_id`; replies echo it back as
//! `in_reply_to` so the transport can correlate acknowledgments.
//!
//! A peer-forwarded `broadcast` is byte-for-byte the same shape as a
//! client-originated one. That is a feature: a node cannot tell them apart
//! and must not try to.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically allocated per-node message identifier.
pub type MsgId = u64;

/// The payload being broadcast. Identity is value-equality — two
/// broadcasts of `5` are the same value no matter which messages carried
/// them.
pub type Value = i64;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// String identifier of a cluster member (or a client — clients get ids
/// from the same namespace and are addressed the same way).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One message on the wire: who sent it, who it is for, and the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender identifier.
    pub src: NodeId,
    /// Recipient identifier.
    pub dest: NodeId,
    /// The typed payload.
    pub body: Body,
}

impl Envelope {
    /// Builds an envelope from `src` to `dest`.
    pub fn new(src: NodeId, dest: NodeId, body: Body) -> Self {
        Self { src, dest, body }
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Message bodies, tagged by the `type` field on the wire.
///
/// An unrecognized `type` fails deserialization; per the error taxonomy
/// that failure is local to the one message that carried it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Body {
    /// Session bootstrap: assigns this node its identifier and lists the
    /// whole cluster. Sent exactly once, before any other message.
    Init {
        msg_id: MsgId,
        node_id: NodeId,
        node_ids: Vec<NodeId>,
    },
    /// Reply to `init`.
    InitOk { in_reply_to: MsgId },

    /// A value to store and propagate. Client-originated and
    /// peer-forwarded broadcasts are indistinguishable by design.
    Broadcast { message: Value, msg_id: MsgId },
    /// Acknowledgment of a `broadcast`, correlated via `in_reply_to`.
    BroadcastOk { in_reply_to: MsgId },

    /// Requests every value this node has observed.
    Read { msg_id: MsgId },
    /// Reply to `read`. `messages` is unordered — no ordering contract.
    ReadOk {
        messages: Vec<Value>,
        in_reply_to: MsgId,
    },

    /// Cluster-wide neighbor assignment. A node takes its own entry and
    /// ignores the rest.
    Topology {
        topology: HashMap<NodeId, Vec<NodeId>>,
        msg_id: MsgId,
    },
    /// Reply to `topology`.
    TopologyOk { in_reply_to: MsgId },
}
