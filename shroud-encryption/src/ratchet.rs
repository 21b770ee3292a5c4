// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forward-secret session keys between two endpoints.
//!
//! On first contact both sides derive a shared secret from an X25519
//! exchange of ephemeral keys; root and chain key start out as that secret.
//! Before every outbound message the chain key takes one step through the
//! one-way chain derivation and the stepped value becomes the message key,
//! so a given chain key value encrypts at most one message and the chain
//! never rewinds. Compromise of the current state reveals nothing about
//! keys already spent.
//!
//! Peers rotate the outer DH keys by sending a fresh ephemeral public key in
//! a `KeyExchange` packet. Both sides then fold the new agreement into the
//! root key and restart the chain from it.
use thiserror::Error;

use crate::crypto::aead::AeadKey;
use crate::crypto::kdf::{self, SESSION_KEY_SIZE};
use crate::crypto::x25519::{PublicKey, SecretKey, X25519Error};
use crate::crypto::{Rng, Secret, SecretError};

/// Evolving key state for one session with one peer.
pub struct RatchetSession {
    our_secret: SecretKey,
    peer_public: PublicKey,
    root_key: Secret<SESSION_KEY_SIZE>,
    chain_key: Secret<SESSION_KEY_SIZE>,
    step: u64,
}

impl RatchetSession {
    /// Open a session towards a peer whose ephemeral public key we learned,
    /// generating our own fresh ephemeral key pair.
    pub fn new(peer_public: PublicKey, rng: &Rng) -> Result<Self, RatchetError> {
        let our_secret = SecretKey::generate(rng)?;
        Self::respond(our_secret, peer_public)
    }

    /// Open a session using an ephemeral secret we already advertised, e.g.
    /// in a handshake packet answered by the peer.
    pub fn respond(our_secret: SecretKey, peer_public: PublicKey) -> Result<Self, RatchetError> {
        let agreement = our_secret.calculate_agreement(&peer_public)?;
        let shared = Secret::from_slice(&agreement)?;
        Ok(Self {
            our_secret,
            peer_public,
            root_key: shared.clone(),
            chain_key: shared,
            step: 0,
        })
    }

    /// Our ephemeral public key, to be sent to the peer.
    pub fn our_public(&self) -> PublicKey {
        self.our_secret.public_key()
    }

    pub fn peer_public(&self) -> &PublicKey {
        &self.peer_public
    }

    /// Number of chain steps taken so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Advance the chain by one step and return the key for the next
    /// message.
    ///
    /// The previous chain key is overwritten (and zeroized); it cannot be
    /// derived back from the returned value.
    pub fn next_message_key(&mut self) -> AeadKey {
        let stepped = kdf::chain_step(&self.chain_key);
        let message_key = *stepped.as_bytes();
        self.chain_key = stepped;
        self.step += 1;
        message_key
    }

    /// Rotate our half of the DH pair: generate a fresh ephemeral key, fold
    /// the new agreement into the root key and restart the chain.
    ///
    /// Returns the fresh public key, to be sent to the peer in a
    /// `KeyExchange` packet; the peer applies it with
    /// [`fold_peer_key`](Self::fold_peer_key) and both sides arrive at the
    /// same new root.
    pub fn rotate(&mut self, rng: &Rng) -> Result<PublicKey, RatchetError> {
        let our_secret = SecretKey::generate(rng)?;
        let agreement = our_secret.calculate_agreement(&self.peer_public)?;
        self.fold(&agreement);
        self.our_secret = our_secret;
        Ok(self.our_public())
    }

    /// Apply a rotated peer key received in a `KeyExchange` packet: fold the
    /// agreement between our current secret and the fresh peer key into the
    /// root and restart the chain.
    pub fn fold_peer_key(&mut self, new_peer_public: PublicKey) -> Result<(), RatchetError> {
        let agreement = self.our_secret.calculate_agreement(&new_peer_public)?;
        self.fold(&agreement);
        self.peer_public = new_peer_public;
        Ok(())
    }

    fn fold(&mut self, agreement: &[u8; SESSION_KEY_SIZE]) {
        let root = kdf::fold_root(&self.root_key, agreement);
        self.chain_key = root.clone();
        self.root_key = root;
    }
}

impl std::fmt::Debug for RatchetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatchetSession")
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum RatchetError {
    #[error(transparent)]
    Agreement(#[from] X25519Error),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::crypto::kdf::chain_step;
    use crate::crypto::x25519::SecretKey;
    use crate::crypto::{Rng, Secret};

    use super::RatchetSession;

    #[test]
    fn both_sides_derive_the_same_keys() {
        let rng = Rng::from_seed([1; 32]);

        let alice_secret = SecretKey::generate(&rng).unwrap();
        let alice_public = alice_secret.public_key();

        let mut bob = RatchetSession::new(alice_public, &rng).unwrap();
        let mut alice = RatchetSession::respond(alice_secret, bob.our_public()).unwrap();

        for _ in 0..16 {
            assert_eq!(alice.next_message_key(), bob.next_message_key());
        }
        assert_eq!(alice.step(), 16);
    }

    #[test]
    fn chain_keys_never_repeat() {
        let rng = Rng::from_seed([2; 32]);
        let peer = SecretKey::generate(&rng).unwrap().public_key();
        let mut session = RatchetSession::new(peer, &rng).unwrap();

        let mut seen = HashSet::new();
        for _ in 0..256 {
            assert!(seen.insert(session.next_message_key()));
        }
    }

    #[test]
    fn stepping_is_forward_only() {
        let rng = Rng::from_seed([3; 32]);
        let peer = SecretKey::generate(&rng).unwrap().public_key();
        let mut session = RatchetSession::new(peer, &rng).unwrap();

        let key_1 = session.next_message_key();
        let key_2 = session.next_message_key();

        // The derivation leads forwards from key 1 to key 2; applying it to
        // key 2 yields key 3, never key 1 again.
        let stepped = chain_step(&Secret::from_bytes(key_1));
        assert_eq!(*stepped.as_bytes(), key_2);
        let stepped = chain_step(&Secret::from_bytes(key_2));
        assert_ne!(*stepped.as_bytes(), key_1);
        assert_ne!(*stepped.as_bytes(), key_2);
    }

    #[test]
    fn rotation_keeps_both_sides_in_sync() {
        let rng = Rng::from_seed([4; 32]);

        let alice_secret = SecretKey::generate(&rng).unwrap();
        let alice_public = alice_secret.public_key();
        let mut bob = RatchetSession::new(alice_public, &rng).unwrap();
        let mut alice = RatchetSession::respond(alice_secret, bob.our_public()).unwrap();

        let before = alice.next_message_key();
        assert_eq!(before, bob.next_message_key());

        // Alice rotates and sends her fresh key; Bob folds it in.
        let fresh_public = alice.rotate(&rng).unwrap();
        bob.fold_peer_key(fresh_public).unwrap();
        assert_eq!(bob.peer_public(), &fresh_public);

        let after = alice.next_message_key();
        assert_eq!(after, bob.next_message_key());
        assert_ne!(before, after);
    }
}
