// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of onion routes with encrypted per-hop routing data.
//!
//! The routing header is not a cleartext wrapper around the onion; it *is*
//! the plaintext of each layer. Peeling a layer yields a [`RouteStep`]:
//! either a `Forward` step naming only the successor hop and carrying the
//! next onion, or the terminal `Deliver` step carrying the signed envelope.
//! A hop therefore learns exactly its predecessor (from the transport) and
//! its successor (from its own layer); no hop ever sees the full path, and
//! tampering with routing data breaks layer authentication at the next hop.
use serde::{Deserialize, Serialize};
use shroud_core::cbor::{CborError, decode_cbor, encode_cbor};
use shroud_core::{Envelope, EnvelopeError, NodeId};
use shroud_encryption::crypto::aead::AeadKey;
use shroud_encryption::{OnionError, OnionPacket, Rng, wrap};
use thiserror::Error;

use crate::path::Path;

/// Upper bound on route length, dictated by the hop counter width.
pub const MAX_ROUTE_HOPS: usize = 256;

/// Plaintext of one onion layer: what the peeling hop is supposed to do.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RouteStep {
    /// Hand the contained packet to the mix stage, destined for `next_hop`.
    Forward {
        next_hop: NodeId,
        hops_left: u8,
        packet: OnionPacket,
    },

    /// This hop is the destination; the envelope is for local delivery.
    Deliver {
        #[serde(with = "serde_bytes")]
        envelope: Vec<u8>,
    },
}

impl RouteStep {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RouteError> {
        Ok(encode_cbor(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RouteError> {
        Ok(decode_cbor(bytes)?)
    }
}

/// Wrap a signed envelope into an onion following `route`.
///
/// The route includes the final recipient as its last element and
/// `layer_keys` holds one key per route node, in route order. The innermost
/// layer is the `Deliver` step under the recipient's key; each outer layer
/// is a `Forward` step under the corresponding hop's key, naming only that
/// hop's successor.
pub fn build_route(
    route: &Path,
    layer_keys: &[AeadKey],
    envelope: &Envelope,
    rng: &Rng,
) -> Result<OnionPacket, RouteError> {
    let hops = route.nodes();
    if layer_keys.len() != hops.len() {
        return Err(RouteError::KeyCountMismatch(layer_keys.len(), hops.len()));
    }
    if hops.len() > MAX_ROUTE_HOPS {
        return Err(RouteError::TooManyHops(hops.len()));
    }

    let deliver = RouteStep::Deliver {
        envelope: envelope.to_bytes()?,
    };
    let mut packet = wrap(&deliver.to_bytes()?, &layer_keys[hops.len() - 1], rng)?;

    for index in (0..hops.len() - 1).rev() {
        let step = RouteStep::Forward {
            next_hop: hops[index + 1],
            hops_left: (hops.len() - 1 - index) as u8,
            packet,
        };
        packet = wrap(&step.to_bytes()?, &layer_keys[index], rng)?;
    }

    Ok(packet)
}

#[derive(Debug, Error)]
pub enum RouteError {
    /// One layer key per route node is required.
    #[error("got {0} layer keys for {1} route nodes")]
    KeyCountMismatch(usize, usize),

    /// The hop counter cannot express routes this long.
    #[error("route of {0} nodes exceeds the hop limit")]
    TooManyHops(usize),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Onion(#[from] OnionError),

    #[error(transparent)]
    Cbor(#[from] CborError),
}

#[cfg(test)]
mod tests {
    use shroud_core::{Envelope, NodeId, PacketType, PrivateKey};
    use shroud_encryption::crypto::aead::AeadKey;
    use shroud_encryption::{OnionPacket, Rng, peel};

    use crate::path::Path;

    use super::{RouteError, RouteStep, build_route};

    fn test_envelope(sender: NodeId, recipient: NodeId) -> Envelope {
        let private_key = PrivateKey::new().unwrap();
        let mut envelope = Envelope::new(
            PacketType::Data,
            sender,
            recipient,
            b"Secret message".to_vec(),
        )
        .unwrap();
        envelope.sign(&private_key).unwrap();
        envelope
    }

    #[test]
    fn peeling_reveals_one_successor_per_hop() {
        let rng = Rng::from_seed([1; 32]);
        let nodes: Vec<NodeId> = (0..4u8)
            .map(|index| NodeId::from_bytes([index; 20]))
            .collect();
        let route = Path::new(nodes.clone()).unwrap();
        let keys: Vec<AeadKey> = (0..4).map(|_| rng.random_array().unwrap()).collect();

        let envelope = test_envelope(nodes[0], nodes[3]);
        let mut packet = build_route(&route, &keys, &envelope, &rng).unwrap();

        // Three forward steps, each naming exactly the next node.
        for hop in 0..3 {
            let peeled = peel(&packet, &keys[hop]).unwrap();
            match RouteStep::from_bytes(&peeled).unwrap() {
                RouteStep::Forward {
                    next_hop,
                    hops_left,
                    packet: inner,
                } => {
                    assert_eq!(next_hop, nodes[hop + 1]);
                    assert_eq!(hops_left as usize, 3 - hop);
                    packet = inner;
                }
                RouteStep::Deliver { .. } => panic!("unexpected deliver step at hop {hop}"),
            }
        }

        // The last layer delivers the intact envelope.
        let peeled = peel(&packet, &keys[3]).unwrap();
        match RouteStep::from_bytes(&peeled).unwrap() {
            RouteStep::Deliver { envelope: bytes } => {
                assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
            }
            RouteStep::Forward { .. } => panic!("expected deliver step"),
        }
    }

    #[test]
    fn single_node_route_is_all_delivery() {
        let rng = Rng::from_seed([2; 32]);
        let node = NodeId::from_bytes([1; 20]);
        let route = Path::new(vec![node]).unwrap();
        let key: AeadKey = rng.random_array().unwrap();

        let envelope = test_envelope(NodeId::from_bytes([9; 20]), node);
        let packet = build_route(&route, &[key], &envelope, &rng).unwrap();

        let peeled = peel(&packet, &key).unwrap();
        assert!(matches!(
            RouteStep::from_bytes(&peeled).unwrap(),
            RouteStep::Deliver { .. }
        ));
    }

    #[test]
    fn key_count_must_match_route() {
        let rng = Rng::from_seed([3; 32]);
        let nodes: Vec<NodeId> = (0..3u8)
            .map(|index| NodeId::from_bytes([index; 20]))
            .collect();
        let route = Path::new(nodes.clone()).unwrap();
        let keys: Vec<AeadKey> = (0..2).map(|_| rng.random_array().unwrap()).collect();

        let envelope = test_envelope(nodes[0], nodes[2]);
        assert!(matches!(
            build_route(&route, &keys, &envelope, &rng),
            Err(RouteError::KeyCountMismatch(2, 3))
        ));
    }

    #[test]
    fn wrong_hop_cannot_read_routing_data() {
        let rng = Rng::from_seed([4; 32]);
        let nodes: Vec<NodeId> = (0..3u8)
            .map(|index| NodeId::from_bytes([index; 20]))
            .collect();
        let route = Path::new(nodes.clone()).unwrap();
        let keys: Vec<AeadKey> = (0..3).map(|_| rng.random_array().unwrap()).collect();

        let envelope = test_envelope(nodes[0], nodes[2]);
        let packet = build_route(&route, &keys, &envelope, &rng).unwrap();

        // The second hop's key does not open the outer layer.
        assert!(peel(&packet, &keys[1]).is_err());

        // Nor does junk decode as a route step.
        let junk = OnionPacket::from_bytes(vec![0; 64]);
        assert!(peel(&junk, &keys[0]).is_err());
    }
}
