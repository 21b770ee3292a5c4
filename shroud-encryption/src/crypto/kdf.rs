// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key derivation steps of the session ratchet.
//!
//! Both derivations are HKDF-SHA256 (RFC 5869) under fixed domain labels, so
//! stepping the chain and folding the root can never produce colliding key
//! material, even from identical inputs. Callers never choose labels; the
//! two operations the protocol has are the two functions this module
//! exports.
use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::Secret;

/// Size of shared secrets, root, chain and message keys.
pub const SESSION_KEY_SIZE: usize = 32;

/// Label of the per-message chain step.
const CHAIN_LABEL: &[u8] = b"shroud-ratchet/chain";

/// Label of the root fold on DH rotation.
const ROOT_LABEL: &[u8] = b"shroud-ratchet/root";

/// One chain step: the next chain key, derived one-way from the current one.
///
/// The previous key is not recoverable from the result short of inverting
/// HKDF, which is what the forward secrecy of the ratchet rests on.
pub(crate) fn chain_step(chain_key: &Secret<SESSION_KEY_SIZE>) -> Secret<SESSION_KEY_SIZE> {
    derive(None, chain_key.as_bytes(), CHAIN_LABEL)
}

/// Fold a fresh DH agreement into the root key after a rotation.
pub(crate) fn fold_root(
    root_key: &Secret<SESSION_KEY_SIZE>,
    agreement: &[u8; SESSION_KEY_SIZE],
) -> Secret<SESSION_KEY_SIZE> {
    derive(Some(root_key), agreement, ROOT_LABEL)
}

fn derive(
    salt: Option<&Secret<SESSION_KEY_SIZE>>,
    ikm: &[u8],
    label: &[u8],
) -> Secret<SESSION_KEY_SIZE> {
    let hk = Hkdf::<Sha256>::new(salt.map(|secret| secret.as_bytes().as_slice()), ikm);
    let mut okm = [0u8; SESSION_KEY_SIZE];
    // A 32-byte output is far below the HKDF-SHA256 expansion limit.
    hk.expand(label, &mut okm)
        .expect("session key fits hkdf output limit");
    Secret::from_bytes(okm)
}

#[cfg(test)]
mod tests {
    use crate::crypto::Secret;

    use super::{chain_step, fold_root};

    #[test]
    fn chain_step_is_deterministic() {
        let chain = Secret::from_bytes([7; 32]);
        assert_eq!(chain_step(&chain), chain_step(&chain));
    }

    #[test]
    fn labels_separate_the_domains() {
        let key = Secret::from_bytes([7; 32]);
        // Same input material, different operation, unrelated output.
        assert_ne!(chain_step(&key), fold_root(&key, &[0; 32]));
    }

    #[test]
    fn stepping_never_revisits_a_key() {
        let mut chain = Secret::from_bytes([7; 32]);
        let mut seen = vec![chain.clone()];
        for _ in 0..64 {
            chain = chain_step(&chain);
            assert!(!seen.contains(&chain));
            seen.push(chain.clone());
        }
    }

    #[test]
    fn fold_depends_on_both_inputs() {
        let root = Secret::from_bytes([1; 32]);
        let other_root = Secret::from_bytes([2; 32]);
        assert_ne!(fold_root(&root, &[9; 32]), fold_root(&other_root, &[9; 32]));
        assert_ne!(fold_root(&root, &[9; 32]), fold_root(&root, &[8; 32]));
    }
}
