// SPDX-License-Identifier: MIT OR Apache-2.0

//! Elliptic-curve Diffie–Hellman (ECDH) key agreement scheme (X25519).
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::ZeroizeOnDrop;

use crate::crypto::{Rng, RngError};

pub const SECRET_KEY_SIZE: usize = 32;
pub const PUBLIC_KEY_SIZE: usize = 32;
pub const AGREEMENT_SIZE: usize = 32;

#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct SecretKey(#[serde(with = "serde_bytes")] [u8; SECRET_KEY_SIZE]);

impl SecretKey {
    /// Generate a fresh ephemeral secret.
    pub fn generate(rng: &Rng) -> Result<Self, X25519Error> {
        Ok(Self::from_bytes(rng.random_array()?))
    }

    /// Create a secret key from raw bytes; clamping is applied on use.
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        SecretKey(bytes)
    }

    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.0
    }

    pub fn public_key(&self) -> PublicKey {
        let secret = x25519_dalek::StaticSecret::from(self.0);
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    /// Derive the shared secret with a peer's public key.
    ///
    /// The all-zero output produced by low-order peer points is rejected.
    pub fn calculate_agreement(
        &self,
        their_public: &PublicKey,
    ) -> Result<[u8; AGREEMENT_SIZE], X25519Error> {
        let secret = x25519_dalek::StaticSecret::from(self.0);
        let their_public = x25519_dalek::PublicKey::from(their_public.0);
        let shared_secret = secret.diffie_hellman(&their_public);
        if !shared_secret.was_contributory() {
            return Err(X25519Error::NonContributory);
        }
        Ok(shared_secret.to_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal the scalar when printing debug info.
        f.debug_struct("SecretKey").field("value", &"***").finish()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(public_key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(public_key)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&hex::encode(self.0)).finish()
    }
}

#[derive(Debug, Error)]
pub enum X25519Error {
    /// The agreement produced the all-zero shared secret.
    #[error("peer public key did not contribute to the shared secret")]
    NonContributory,

    #[error(transparent)]
    Rng(#[from] RngError),
}
