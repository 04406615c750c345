// Copyright (c) 2026 Murmur Contributors. MIT License.
// See LICENSE for details.

//! # Murmur Protocol — Core Library
//!
//! The broadcast engine behind `murmur-node`: every node in a small, fixed
//! cluster eventually observes every distinct value a client injects
//! anywhere, despite message loss, without processing anything twice.
//!
//! The strategy is flood gossip with acknowledgment-driven retransmission.
//! A node that sees a value for the first time stores it, forwards it to
//! its topology neighbors (minus whoever sent it), and keeps resending on a
//! fixed cadence to every neighbor that has not yet acknowledged receipt.
//! An unresponsive peer is retried forever — there is no failure detector
//! here, and pretending otherwise would just be a timeout with extra steps.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the moving parts of the
//! broadcast flow:
//!
//! - **message** — Wire model: envelopes and the tagged body enum.
//! - **broadcast** — The engine: dedup store, topology view, ack tracker,
//!   and the gossip orchestration + retry loop.
//! - **config** — Protocol constants (retry cadence and friends).
//! - **error** — The one error enum every fallible path funnels into.
//!
//! Transport is deliberately absent: this crate never touches stdin,
//! sockets, or message-id allocation. The engine speaks through the
//! [`broadcast::Transport`] trait and the binary supplies the wiring —
//! same split as any sane protocol/node pairing.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod message;

pub use broadcast::{AckTracker, GossipEngine, TopologyView, Transport, ValueStore};
pub use error::ProtocolError;
pub use message::{Body, Envelope, MsgId, NodeId, Value};
