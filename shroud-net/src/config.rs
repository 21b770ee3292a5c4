// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default capacity of a mix node's input queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default number of packets taken per batch tick.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default period of the batch former.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Default per-packet delay bounds.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(200);

/// A node is considered live when it was last seen within this window.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Configuration parameters for a mix node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixConfig {
    /// Capacity of the input queue; enqueueing beyond it fails.
    pub queue_capacity: usize,

    /// How many packets are taken from the queue head per tick.
    pub batch_size: usize,

    /// Period of the batch former.
    pub batch_interval: Duration,

    /// Lower bound of the random per-packet delay.
    pub min_delay: Duration,

    /// Upper bound of the random per-packet delay.
    pub max_delay: Duration,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl MixConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::InvalidDelayBounds(
                self.min_delay,
                self.max_delay,
            ));
        }
        Ok(())
    }
}

/// Bounds for the number of relay hops of a path.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PathConfig {
    pub min_hops: usize,
    pub max_hops: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            min_hops: 2,
            max_hops: 4,
        }
    }
}

impl PathConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_hops == 0 {
            return Err(ConfigError::ZeroMinHops);
        }
        if self.max_hops < self.min_hops {
            return Err(ConfigError::InvalidHopBounds(self.min_hops, self.max_hops));
        }
        Ok(())
    }
}

/// How much anonymity the application asks for on a message, traded against
/// latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnonymityLevel {
    /// Short paths, no mixing: fast, linkable by a local observer.
    Low,

    /// Mixed delivery over a medium path.
    Standard,

    /// Long paths and mixing at every hop.
    High,
}

impl AnonymityLevel {
    /// Hop bounds for paths built at this level.
    pub fn path_config(&self) -> PathConfig {
        match self {
            AnonymityLevel::Low => PathConfig {
                min_hops: 1,
                max_hops: 2,
            },
            AnonymityLevel::Standard => PathConfig {
                min_hops: 2,
                max_hops: 4,
            },
            AnonymityLevel::High => PathConfig {
                min_hops: 4,
                max_hops: 6,
            },
        }
    }

    /// Whether packets pass through the batch-and-delay mix stage.
    pub fn use_mix(&self) -> bool {
        !matches!(self, AnonymityLevel::Low)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mix queue capacity must be positive")]
    ZeroQueueCapacity,

    #[error("mix batch size must be positive")]
    ZeroBatchSize,

    #[error("invalid delay bounds: min {0:?} exceeds max {1:?}")]
    InvalidDelayBounds(Duration, Duration),

    #[error("minimum path length must be at least 1")]
    ZeroMinHops,

    #[error("invalid hop bounds: min {0} exceeds max {1}")]
    InvalidHopBounds(usize, usize),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AnonymityLevel, ConfigError, MixConfig, PathConfig};

    #[test]
    fn default_configs_are_valid() {
        assert!(MixConfig::default().validate().is_ok());
        assert!(PathConfig::default().validate().is_ok());
        for level in [
            AnonymityLevel::Low,
            AnonymityLevel::Standard,
            AnonymityLevel::High,
        ] {
            assert!(level.path_config().validate().is_ok());
        }
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = MixConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroQueueCapacity)
        ));

        let config = MixConfig {
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(200),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDelayBounds(_, _))
        ));

        let config = PathConfig {
            min_hops: 5,
            max_hops: 2,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHopBounds(5, 2))
        ));
    }

    #[test]
    fn anonymity_levels_scale_hops() {
        assert!(!AnonymityLevel::Low.use_mix());
        assert!(AnonymityLevel::Standard.use_mix());
        assert!(AnonymityLevel::High.use_mix());
        assert!(
            AnonymityLevel::High.path_config().min_hops
                > AnonymityLevel::Standard.path_config().min_hops
        );
    }
}
