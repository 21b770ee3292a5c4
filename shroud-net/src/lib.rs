// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing machinery of the shroud anonymous messaging overlay.
//!
//! This crate turns the primitives from `shroud-core` and
//! `shroud-encryption` into a running node:
//!
//! - [`node_table`]: the set of overlay nodes known to us, fed by a peer
//!   discovery process, with a freshness window deciding liveness.
//! - [`path`]: uniform random selection of relay paths from the live set.
//! - [`route`]: onion routes whose per-hop routing data is itself encrypted
//!   inside each layer; no hop learns more than its successor.
//! - [`mix`]: the batch-shuffle-delay stage breaking arrival-order and
//!   timing correlation at every hop.
//! - [`relay`]: the per-hop state machine: peel, then forward through the
//!   mix or validate and deliver locally.
//! - [`outbound`]: the send path: chunk, envelope, sign, onion-wrap.
//! - [`transport`]: the seam towards the byte transport, which is an
//!   opaque collaborator.
//!
//! The node itself is stateless across restarts; only identity keys persist.
pub mod config;
pub mod mix;
pub mod node_table;
pub mod outbound;
pub mod path;
pub mod relay;
pub mod replay;
pub mod route;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod transport;

pub use config::{AnonymityLevel, ConfigError, MixConfig, PathConfig};
pub use mix::{MixError, MixNode, MixPacket, MixStats};
pub use node_table::NodeTable;
pub use outbound::{DEFAULT_CHUNK_SIZE, OutboundError, prepare_message};
pub use path::{Path, PathBuilder, PathError};
pub use relay::{
    DeliveredMessage, DropReason, Relay, RelayCounters, RelayCountersSnapshot, RelayError,
    RelayOutcome, spawn_forwarder,
};
pub use replay::ReplayCache;
pub use route::{RouteError, RouteStep, build_route};
pub use transport::Transport;
