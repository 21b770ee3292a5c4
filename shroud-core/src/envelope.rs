// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed packet envelope.
//!
//! The envelope is the innermost unit of the system: it names a sender and a
//! recipient, carries the payload bytes and is signed by the sender's
//! identity key. On the wire it travels fully encrypted inside the onion
//! layers; only the final recipient ever sees it.
//!
//! The signable form is the canonical CBOR encoding of the envelope with the
//! signature field absent, which makes signatures deterministic across
//! implementations. The random nonce together with the timestamp feeds the
//! replay protection of receiving relays.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cbor::{CborError, decode_cbor, encode_cbor};
use crate::identity::{PrivateKey, PublicKey, Signature};
use crate::node_id::NodeId;

/// The length of the envelope replay nonce in bytes.
pub const NONCE_LEN: usize = 16;

/// Role of a packet within the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketType {
    /// Application payload, usually a CBOR-encoded chunk.
    Data,

    /// Acknowledgement of a previously received packet.
    Ack,

    /// First contact with a peer.
    Handshake,

    /// Carries a fresh ephemeral public key to rotate the session ratchet.
    KeyExchange,
}

/// Signed packet travelling between two endpoints of the overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub packet_type: PacketType,

    /// Identifier of the sending node.
    pub sender: NodeId,

    /// Identifier of the receiving node.
    pub recipient: NodeId,

    /// Time in seconds since the Unix epoch at creation.
    pub timestamp: u64,

    /// Random nonce for replay protection.
    #[serde(with = "serde_bytes")]
    pub nonce: [u8; NONCE_LEN],

    /// Payload bytes, opaque to every relay.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    /// Signature by the sender's identity key, `None` until signed.
    pub signature: Option<Signature>,
}

impl Envelope {
    /// Create a fresh unsigned envelope, stamped with the current wall-clock
    /// time and a random nonce.
    pub fn new(
        packet_type: PacketType,
        sender: NodeId,
        recipient: NodeId,
        payload: Vec<u8>,
    ) -> Result<Self, EnvelopeError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|_| EnvelopeError::NotEnoughRandomness)?;

        Ok(Self {
            packet_type,
            sender,
            recipient,
            timestamp: unix_timestamp(),
            nonce,
            payload,
            signature: None,
        })
    }

    /// The canonical byte string covered by the signature: the CBOR encoding
    /// of this envelope with the signature field absent.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let unsigned = Self {
            signature: None,
            ..self.clone()
        };
        Ok(encode_cbor(&unsigned)?)
    }

    /// Sign the envelope with the sender's identity key.
    pub fn sign(&mut self, private_key: &PrivateKey) -> Result<(), EnvelopeError> {
        let bytes = self.signable_bytes()?;
        self.signature = Some(private_key.sign(&bytes));
        Ok(())
    }

    /// Verify the envelope signature against the claimed sender's key.
    pub fn verify(&self, public_key: &PublicKey) -> Result<(), EnvelopeError> {
        let signature = self.signature.as_ref().ok_or(EnvelopeError::Unsigned)?;
        let bytes = self.signable_bytes()?;
        if !public_key.verify(&bytes, signature) {
            return Err(EnvelopeError::BadSignature);
        }
        Ok(())
    }

    /// Check structural validity: a nonzero timestamp and a non-empty
    /// payload. Sender and recipient are non-empty by construction.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.timestamp == 0 {
            return Err(EnvelopeError::ZeroTimestamp);
        }
        if self.payload.is_empty() {
            return Err(EnvelopeError::EmptyPayload);
        }
        Ok(())
    }

    /// True iff the envelope is older than `max_age`.
    ///
    /// Envelopes stamped in the future are not considered expired; the
    /// replay cache covers them.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        unix_timestamp().saturating_sub(self.timestamp) > max_age.as_secs()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(encode_cbor(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(decode_cbor(bytes)?)
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope carries no signature.
    #[error("envelope is not signed")]
    Unsigned,

    /// The signature does not match the claimed sender.
    #[error("signature does not match claimed sender key")]
    BadSignature,

    /// Envelopes must be stamped at creation time.
    #[error("timestamp cannot be zero")]
    ZeroTimestamp,

    /// Empty payloads are never legitimate.
    #[error("payload cannot be empty")]
    EmptyPayload,

    /// The system entropy source failed.
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,

    #[error(transparent)]
    Cbor(#[from] CborError),
}
