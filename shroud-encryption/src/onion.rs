// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nested authenticated encryption for onion routing.
//!
//! An onion packet is the byte string `nonce(12) ‖ ciphertext ‖ tag(16)`;
//! its serialization is the identity. Wrapping seals a plaintext under one
//! hop key with a fresh random nonce, peeling splits off the nonce and opens
//! the remainder.
//!
//! A payload routed over hops `N₁ … Nₖ` is wrapped innermost-first: the
//! packet handed to `N₁` is `wrap(wrap(… wrap(payload, Kₖ) …, K₂), K₁)`.
//! Each hop peels exactly one layer with its own key and learns nothing
//! about the layers beneath. Because every layer is authenticated, a
//! tampered packet fails at the first affected hop; no partially corrupted
//! onion is ever relayed.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::aead::{AeadKey, AeadNonce, aead_decrypt, aead_encrypt};
use crate::crypto::{Rng, RngError};

/// Size of the nonce prefixed to every onion layer.
pub const ONION_NONCE_SIZE: usize = 12;

/// Bytes added by one layer of wrapping: the nonce prefix plus the
/// authentication tag.
pub const ONION_LAYER_OVERHEAD: usize = ONION_NONCE_SIZE + 16;

/// One or more layers of authenticated encryption around a payload.
///
/// The wire representation is the contained bytes, nothing else.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnionPacket(#[serde(with = "serde_bytes")] Vec<u8>);

impl OnionPacket {
    /// Treat raw bytes received from the wire as an onion packet.
    ///
    /// No structure is checked here; authentication happens at peel time.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for OnionPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Packet contents stay confidential, only the size is of interest.
        f.debug_struct("OnionPacket")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Seal a plaintext under one hop key with a fresh random nonce.
pub fn wrap(plaintext: &[u8], key: &AeadKey, rng: &Rng) -> Result<OnionPacket, OnionError> {
    let nonce: AeadNonce = rng.random_array()?;
    let ciphertext = aead_encrypt(key, plaintext, nonce, None).map_err(|_| OnionError::Seal)?;

    let mut bytes = Vec::with_capacity(ONION_NONCE_SIZE + ciphertext.len());
    bytes.extend_from_slice(&nonce);
    bytes.extend_from_slice(&ciphertext);
    Ok(OnionPacket(bytes))
}

/// Remove one layer: split off the nonce and open the remainder.
///
/// Fails with [`OnionError::MalformedPacket`] when the packet cannot even
/// contain a nonce and with [`OnionError::AuthFailure`] when the tag does
/// not verify under the given key. There are no other failure modes.
pub fn peel(packet: &OnionPacket, key: &AeadKey) -> Result<Vec<u8>, OnionError> {
    if packet.len() < ONION_NONCE_SIZE {
        return Err(OnionError::MalformedPacket(packet.len()));
    }

    let (nonce, ciphertext) = packet.0.split_at(ONION_NONCE_SIZE);
    let nonce: AeadNonce = nonce.try_into().expect("nonce length checked above");
    aead_decrypt(key, ciphertext, nonce, None).map_err(|_| OnionError::AuthFailure)
}

/// Wrap a payload once per hop key, innermost layer first.
///
/// `keys` is ordered like the path: `keys[0]` belongs to the entry hop and
/// is the outermost layer, the last key to the final hop.
pub fn wrap_layers(payload: &[u8], keys: &[AeadKey], rng: &Rng) -> Result<OnionPacket, OnionError> {
    if keys.is_empty() {
        return Err(OnionError::NoLayers);
    }

    let mut keys = keys.iter().rev();
    // Non-emptiness checked above.
    let innermost = keys.next().expect("at least one key");
    let mut packet = wrap(payload, innermost, rng)?;
    for key in keys {
        packet = wrap(packet.as_bytes(), key, rng)?;
    }
    Ok(packet)
}

#[derive(Debug, Error)]
pub enum OnionError {
    /// The packet is shorter than a nonce; nothing can be peeled off it.
    #[error("onion packet of {0} bytes is too short to carry a layer")]
    MalformedPacket(usize),

    /// The authentication tag does not verify under the supplied key.
    #[error("onion layer failed authentication")]
    AuthFailure,

    /// Wrapping over an empty key list is meaningless.
    #[error("onion wrapping requires at least one layer key")]
    NoLayers,

    /// Sealing a layer failed inside the cipher.
    #[error("could not seal onion layer")]
    Seal,

    #[error(transparent)]
    Rng(#[from] RngError),
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;
    use crate::crypto::aead::AeadKey;

    use super::{ONION_LAYER_OVERHEAD, OnionError, OnionPacket, peel, wrap, wrap_layers};

    #[test]
    fn single_hop_round_trip() {
        let rng = Rng::from_seed([1; 32]);
        let key: AeadKey = [0; 32];

        let packet = wrap(b"Hello, World!", &key, &rng).unwrap();
        assert_eq!(packet.len(), 13 + ONION_LAYER_OVERHEAD);
        assert_eq!(peel(&packet, &key).unwrap(), b"Hello, World!");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let rng = Rng::from_seed([1; 32]);
        let key: AeadKey = rng.random_array().unwrap();
        let other_key: AeadKey = rng.random_array().unwrap();

        let packet = wrap(b"Hello, World!", &key, &rng).unwrap();
        assert!(matches!(
            peel(&packet, &other_key),
            Err(OnionError::AuthFailure)
        ));
    }

    #[test]
    fn truncated_packet_is_malformed() {
        let key: AeadKey = [0; 32];
        let packet = OnionPacket::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            peel(&packet, &key),
            Err(OnionError::MalformedPacket(3))
        ));
    }

    #[test]
    fn three_layer_onion() {
        let rng = Rng::from_seed([2; 32]);
        let key_1: AeadKey = rng.random_array().unwrap();
        let key_2: AeadKey = rng.random_array().unwrap();
        let key_3: AeadKey = rng.random_array().unwrap();

        let packet = wrap_layers(b"Secret message", &[key_1, key_2, key_3], &rng).unwrap();

        let layer_2 = OnionPacket::from_bytes(peel(&packet, &key_1).unwrap());
        let layer_3 = OnionPacket::from_bytes(peel(&layer_2, &key_2).unwrap());
        assert_eq!(peel(&layer_3, &key_3).unwrap(), b"Secret message");
    }

    #[test]
    fn peeling_out_of_order_fails() {
        let rng = Rng::from_seed([2; 32]);
        let key_1: AeadKey = rng.random_array().unwrap();
        let key_2: AeadKey = rng.random_array().unwrap();

        let packet = wrap_layers(b"Secret message", &[key_1, key_2], &rng).unwrap();
        assert!(matches!(peel(&packet, &key_2), Err(OnionError::AuthFailure)));
    }

    #[test]
    fn no_keys_is_an_error() {
        let rng = Rng::from_seed([2; 32]);
        assert!(matches!(
            wrap_layers(b"Secret message", &[], &rng),
            Err(OnionError::NoLayers)
        ));
    }

    #[test]
    fn tampered_layer_dies_at_first_hop() {
        let rng = Rng::from_seed([3; 32]);
        let key_1: AeadKey = rng.random_array().unwrap();
        let key_2: AeadKey = rng.random_array().unwrap();

        let packet = wrap_layers(b"Secret message", &[key_1, key_2], &rng).unwrap();
        let mut bytes = packet.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let tampered = OnionPacket::from_bytes(bytes);
        assert!(matches!(peel(&tampered, &key_1), Err(OnionError::AuthFailure)));
    }
}
