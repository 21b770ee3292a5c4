// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of the full send path: chunk, envelope, sign, onion-wrap.
//!
//! The caller decides the route (typically `PathBuilder` output extended
//! with the recipient as terminal node) and supplies one layer key per route
//! node from its key store. Each chunk of the payload travels as its own
//! signed envelope inside its own onion, all addressed to the route's entry
//! hop.
use shroud_core::cbor::{CborError, encode_cbor};
use shroud_core::{
    Chunk, ChunkError, Envelope, EnvelopeError, MessageId, NodeId, PacketType, PrivateKey,
    split_message,
};
use shroud_encryption::crypto::aead::AeadKey;
use shroud_encryption::{OnionPacket, Rng};
use thiserror::Error;

use crate::path::Path;
use crate::route::{RouteError, build_route};

/// Default chunk size for outbound payloads, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Split a payload and wrap every chunk for transit along `route`.
///
/// `route` must terminate at `recipient` and `layer_keys` holds one key per
/// route node, in route order. Returns the onion packets to hand to the
/// entry hop, in chunk order; the recipient's assembler restores payload
/// order regardless of how the network reorders them.
#[allow(clippy::too_many_arguments)]
pub fn prepare_message(
    private_key: &PrivateKey,
    sender: NodeId,
    recipient: NodeId,
    payload: &[u8],
    route: &Path,
    layer_keys: &[AeadKey],
    chunk_size: usize,
    rng: &Rng,
) -> Result<Vec<OnionPacket>, OutboundError> {
    if route.last() != recipient {
        return Err(OutboundError::RecipientNotTerminal(recipient));
    }

    let message_id = MessageId::random()?;
    let chunks = split_message(message_id, payload, chunk_size)?;

    let mut packets = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let mut envelope = Envelope::new(
            PacketType::Data,
            sender,
            recipient,
            encode_chunk(&chunk)?,
        )?;
        envelope.sign(private_key)?;
        packets.push(build_route(route, layer_keys, &envelope, rng)?);
    }

    Ok(packets)
}

fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>, OutboundError> {
    Ok(encode_cbor(chunk)?)
}

#[derive(Debug, Error)]
pub enum OutboundError {
    /// The route does not end at the message's recipient.
    #[error("route does not terminate at recipient {0}")]
    RecipientNotTerminal(NodeId),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Cbor(#[from] CborError),
}
