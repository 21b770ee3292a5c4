// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use shroud_core::NodeId;
use shroud_core::envelope::NONCE_LEN;

/// Default number of `(sender, nonce)` pairs remembered.
pub const DEFAULT_REPLAY_CAPACITY: usize = 4096;

/// Bounded cache of recently seen envelope nonces.
///
/// A nonce needs to be remembered only for as long as the envelope carrying
/// it would pass the expiry check, so entries older than the replay window
/// are evicted on access. Capacity eviction drops the oldest entries first;
/// keys are never re-inserted, so insertion order is age order.
#[derive(Debug)]
pub struct ReplayCache {
    capacity: usize,
    window: Duration,
    entries: HashMap<(NodeId, [u8; NONCE_LEN]), Instant>,
    order: VecDeque<(NodeId, [u8; NONCE_LEN])>,
}

impl ReplayCache {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record a `(sender, nonce)` pair.
    ///
    /// Returns `true` if the pair was fresh and is now remembered, `false`
    /// if it was seen before within the window, a replay.
    pub fn check_and_insert(&mut self, sender: NodeId, nonce: [u8; NONCE_LEN]) -> bool {
        self.evict_expired();

        let key = (sender, nonce);
        if self.entries.contains_key(&key) {
            return false;
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        self.entries.insert(key, Instant::now());
        self.order.push_back(key);
        true
    }

    fn evict_expired(&mut self) {
        while let Some(front) = self.order.front() {
            let expired = self
                .entries
                .get(front)
                .map(|seen_at| seen_at.elapsed() > self.window)
                .unwrap_or(true);
            if !expired {
                break;
            }
            let front = *front;
            self.order.pop_front();
            self.entries.remove(&front);
        }
    }

    /// Number of remembered pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shroud_core::NodeId;

    use super::ReplayCache;

    fn sender(label: u8) -> NodeId {
        NodeId::from_bytes([label; 20])
    }

    #[test]
    fn repeated_nonce_is_a_replay() {
        let mut cache = ReplayCache::new(16, Duration::from_secs(60));

        assert!(cache.check_and_insert(sender(1), [7; 16]));
        assert!(!cache.check_and_insert(sender(1), [7; 16]));

        // Same nonce from a different sender is a different key.
        assert!(cache.check_and_insert(sender(2), [7; 16]));
    }

    #[test]
    fn capacity_evicts_the_oldest() {
        let mut cache = ReplayCache::new(2, Duration::from_secs(60));

        assert!(cache.check_and_insert(sender(1), [1; 16]));
        assert!(cache.check_and_insert(sender(1), [2; 16]));
        assert!(cache.check_and_insert(sender(1), [3; 16]));
        assert_eq!(cache.len(), 2);

        // The oldest entry was evicted, so its nonce reads as fresh again.
        assert!(cache.check_and_insert(sender(1), [1; 16]));
    }

    #[test]
    fn entries_expire_with_the_window() {
        let mut cache = ReplayCache::new(16, Duration::ZERO);

        assert!(cache.check_and_insert(sender(1), [1; 16]));
        std::thread::sleep(Duration::from_millis(5));
        // The previous entry aged out of the window.
        assert!(cache.check_and_insert(sender(1), [1; 16]));
    }
}
