// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::ZeroizeOnDrop;

/// Container for session key material: shared secrets, root and chain keys.
///
/// Wipes its bytes on drop, compares in constant time and never prints its
/// contents. Accessors are crate-private so key material cannot wander out
/// through the public API; the ratchet converts to a concrete message key at
/// the last possible moment.
#[derive(Clone, Eq, ZeroizeOnDrop)]
pub struct Secret<const N: usize>([u8; N]);

impl<const N: usize> Secret<N> {
    /// Take ownership of key material of the exact expected length.
    ///
    /// Every secret entering a session from the outside (an agreement, a
    /// decoded key-exchange payload) passes through this length check.
    pub(crate) fn from_slice(bytes: &[u8]) -> Result<Self, SecretError> {
        let owned: [u8; N] = bytes
            .try_into()
            .map_err(|_| SecretError::WrongLength(bytes.len(), N))?;
        Ok(Self(owned))
    }

    pub(crate) fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison.
        self.0.ct_eq(&other.0).into()
    }
}

impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the size ever leaves this container.
        f.debug_struct("Secret").field("len", &N).finish()
    }
}

#[derive(Debug, Error)]
pub enum SecretError {
    /// Key material of the wrong length.
    #[error("got {0} bytes of key material, expected {1}")]
    WrongLength(usize, usize),
}
