// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core cryptographic algorithms and random number generator.
//!
//! Algorithms:
//! - ChaCha20Poly1305 AEAD (256-bit key, 96-bit nonce, 128-bit tag)
//! - X25519 ECDH key agreement
//! - HKDF-SHA256 ratchet derivations with fixed domain labels
//!
//! Random number generator:
//! - ChaCha20 stream cipher, seeded via the operating system
pub mod aead;
pub(crate) mod kdf;
mod rng;
mod secret;
pub mod x25519;

pub use kdf::SESSION_KEY_SIZE;
pub use rng::{Rng, RngError};
pub use secret::{Secret, SecretError};
