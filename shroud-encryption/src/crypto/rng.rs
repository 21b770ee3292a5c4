// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator that uses the ChaCha
/// algorithm.
///
/// Every random choice that affects security (nonces, ephemeral keys, path
/// draws, batch shuffles, mix delays) goes through this type.
#[derive(Debug)]
pub struct Rng {
    rng: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }
}

impl Rng {
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut rng = self.rng.lock().map_err(|_| RngError::LockPoisoned)?;
        let mut out = [0u8; N];
        rng.try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }

    pub fn random_vec(&self, len: usize) -> Result<Vec<u8>, RngError> {
        let mut rng = self.rng.lock().map_err(|_| RngError::LockPoisoned)?;
        let mut out = vec![0u8; len];
        rng.try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }

    /// Uniform random integer in `[0, upper)` by rejection sampling.
    ///
    /// Values above the largest multiple of `upper` are re-drawn, so the
    /// result carries no modulo bias.
    pub fn random_bounded(&self, upper: u64) -> Result<u64, RngError> {
        if upper == 0 {
            return Err(RngError::EmptyRange);
        }

        let zone = (u64::MAX / upper) * upper;
        let mut rng = self.rng.lock().map_err(|_| RngError::LockPoisoned)?;
        loop {
            let value = rng
                .try_next_u64()
                .map_err(|_| RngError::NotEnoughRandomness)?;
            if value < zone {
                return Ok(value % upper);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("rng lock is poisoned")]
    LockPoisoned,

    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,

    #[error("cannot sample from an empty range")]
    EmptyRange,
}

#[cfg(test)]
mod tests {
    use super::{Rng, RngError};

    #[test]
    fn deterministic_randomness() {
        let sample_1 = {
            let rng = Rng::from_seed([1; 32]);
            rng.random_vec(128).unwrap()
        };

        let sample_2 = {
            let rng = Rng::from_seed([1; 32]);
            rng.random_vec(128).unwrap()
        };

        assert_eq!(sample_1, sample_2);
    }

    #[test]
    fn bounded_sampling_stays_in_range() {
        let rng = Rng::from_seed([2; 32]);
        for upper in [1, 2, 7, 100, 1000] {
            for _ in 0..200 {
                assert!(rng.random_bounded(upper).unwrap() < upper);
            }
        }
    }

    #[test]
    fn bounded_sampling_rejects_empty_range() {
        let rng = Rng::from_seed([2; 32]);
        assert!(matches!(rng.random_bounded(0), Err(RngError::EmptyRange)));
    }

    #[test]
    fn bounded_sampling_covers_range() {
        let rng = Rng::from_seed([3; 32]);
        let mut seen = [false; 8];
        for _ in 0..1000 {
            seen[rng.random_bounded(8).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }
}
