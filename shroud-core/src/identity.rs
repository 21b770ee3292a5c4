// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 key pairs to sign and verify packet envelopes.
//!
//! Identity keys are the only long-lived artifact of a node. They are
//! persisted opaquely via their raw bytes representation and re-read on
//! restart; everything else in the core is ephemeral.
//!
//! ## Example
//!
//! ```
//! use shroud_core::PrivateKey;
//!
//! let private_key = PrivateKey::new().unwrap();
//! let public_key = private_key.public_key();
//!
//! let signature = private_key.sign(b"A very important message.");
//! assert!(public_key.verify(b"A very important message.", &signature));
//! ```
use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::ZeroizeOnDrop;

/// The length of an Ed25519 private key seed in bytes.
pub const PRIVATE_KEY_LEN: usize = 32;

/// The length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// The length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 signing key.
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct PrivateKey(#[serde(with = "serde_bytes")] [u8; PRIVATE_KEY_LEN]);

impl PrivateKey {
    /// Generate a fresh signing key from the operating system's entropy
    /// source.
    pub fn new() -> Result<Self, IdentityError> {
        let mut bytes = [0u8; PRIVATE_KEY_LEN];
        getrandom::fill(&mut bytes).map_err(|_| IdentityError::NotEnoughRandomness)?;
        Ok(Self(bytes))
    }

    /// Re-create a signing key from its raw bytes representation, as read
    /// back from the key store.
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes representation, suitable for opaque persistence.
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.0
    }

    /// Derive the verifying key for this signing key.
    pub fn public_key(&self) -> PublicKey {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&self.0);
        PublicKey(signing_key.verifying_key().to_bytes())
    }

    /// Sign a byte string.
    pub fn sign(&self, bytes: &[u8]) -> Signature {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&self.0);
        Signature(signing_key.sign(bytes).to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal the key when printing debug info.
        f.debug_struct("PrivateKey").field("value", &"***").finish()
    }
}

/// Ed25519 verifying key identifying the author of an envelope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create a `PublicKey` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Bytes of the public key.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Convert the public key to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a byte string.
    ///
    /// Returns `false` for signatures which do not match as well as for
    /// public key bytes which do not form a valid curve point.
    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        verifying_key.verify(bytes, &signature).is_ok()
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();
        let checked_value: [u8; PUBLIC_KEY_LEN] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(value_len, PUBLIC_KEY_LEN))?;
        Ok(Self(checked_value))
    }
}

impl FromStr for PublicKey {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

/// Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes")] [u8; SIGNATURE_LEN]);

impl Signature {
    /// Create a `Signature` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Bytes of the signature.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Convert the signature to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&self.to_hex()).finish()
    }
}

/// Error types for identity keys.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Key material has an invalid length.
    #[error("invalid key length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Key string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in key string")]
    InvalidHexEncoding(#[from] hex::FromHexError),

    /// The system entropy source failed.
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}

#[cfg(test)]
mod tests {
    use super::{PrivateKey, PublicKey, Signature};

    #[test]
    fn sign_and_verify() {
        let private_key = PrivateKey::new().unwrap();
        let public_key = private_key.public_key();

        let signature = private_key.sign(b"Hello, Shroud!");
        assert!(public_key.verify(b"Hello, Shroud!", &signature));
        assert!(!public_key.verify(b"Hello, shroud!", &signature));
    }

    #[test]
    fn foreign_key_fails_verification() {
        let private_key = PrivateKey::new().unwrap();
        let other_public_key = PrivateKey::new().unwrap().public_key();

        let signature = private_key.sign(b"Hello, Shroud!");
        assert!(!other_public_key.verify(b"Hello, Shroud!", &signature));
    }

    #[test]
    fn persistence_round_trip() {
        let private_key = PrivateKey::new().unwrap();
        let restored = PrivateKey::from_bytes(private_key.to_bytes());

        let signature = restored.sign(b"Hello, Shroud!");
        assert!(private_key.public_key().verify(b"Hello, Shroud!", &signature));
    }

    #[test]
    fn tampered_signature_fails() {
        let private_key = PrivateKey::new().unwrap();
        let public_key = private_key.public_key();

        let signature = private_key.sign(b"Hello, Shroud!");
        let mut bytes = *signature.as_bytes();
        bytes[3] ^= 0x01;
        let tampered = Signature::from_bytes(bytes);
        assert!(!public_key.verify(b"Hello, Shroud!", &tampered));
    }

    #[test]
    fn public_key_hex_round_trip() {
        let public_key = PrivateKey::new().unwrap().public_key();
        let parsed: PublicKey = public_key.to_hex().parse().unwrap();
        assert_eq!(parsed, public_key);
    }
}
