// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam towards the byte transport between node addresses.
//!
//! The core consumes exactly two operations: an inbound byte-stream per
//! listening address and fire-and-forget sends. Connection management,
//! sockets and retries belong to the transport implementation outside this
//! crate. A failed send is the implementation's problem to log; the packet
//! is simply gone, like any other packet the network loses.
use tokio::sync::mpsc;

pub trait Transport: Send + Sync {
    /// Register an address and return the stream of bytes arriving at it.
    fn listen(&self, address: &str) -> mpsc::Receiver<Vec<u8>>;

    /// Fire-and-forget delivery of opaque bytes to a node address.
    fn send(&self, address: &str, bytes: Vec<u8>);
}
