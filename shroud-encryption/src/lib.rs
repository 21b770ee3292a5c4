// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic layer of the shroud anonymous messaging overlay.
//!
//! Three pieces live here, leaves first:
//!
//! - [`crypto`]: the primitives: ChaCha20-Poly1305 AEAD, X25519 key
//!   agreement, HKDF-SHA256, a ChaCha20-based cryptographic random number
//!   generator and a zeroizing container for secret bytes.
//! - [`onion`]: nested authenticated encryption. A payload is wrapped in
//!   one AEAD layer per hop of its path so that each hop, peeling with its
//!   own key, learns nothing but its successor. Authentication at every
//!   layer means a tampered packet dies at the first affected hop.
//! - [`ratchet`]: forward-secret session keys between two endpoints. A
//!   chain key evolves through a one-way KDF once per message; recovering a
//!   spent key from the current state is as hard as inverting the KDF.
//!
//! All randomness that affects security (nonces, ephemeral keys, key
//! material) comes from the [`Rng`] wrapper around a ChaCha20 stream cipher
//! seeded from the operating system.
pub mod crypto;
pub mod onion;
pub mod ratchet;

pub use crypto::{Rng, RngError, Secret, SecretError};
pub use onion::{OnionError, OnionPacket, peel, wrap, wrap_layers};
pub use ratchet::{RatchetError, RatchetSession};
