// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types for the shroud anonymous messaging overlay.
//!
//! This crate holds everything the rest of the stack agrees on before any
//! cryptographic layering or routing takes place: long-lived Ed25519 identity
//! keys, random node identifiers, the canonical CBOR encoding, the signed
//! packet envelope travelling inside the innermost onion layer, and the
//! chunking machinery which splits oversized payloads for transit and puts
//! them back together at the destination.
//!
//! Higher layers live in `shroud-encryption` (onion codec, session ratchet)
//! and `shroud-net` (path selection, mixing, relaying).
pub mod cbor;
pub mod chunk;
pub mod envelope;
pub mod identity;
pub mod node_id;

pub use chunk::{Chunk, ChunkAssembler, ChunkError, MessageId, split_message};
pub use envelope::{Envelope, EnvelopeError, PacketType};
pub use identity::{IdentityError, PrivateKey, PublicKey, Signature};
pub use node_id::{NodeId, NodeIdError};
