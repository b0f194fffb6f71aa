//! Front cache sizing.

use std::time::Duration;

/// Sizing of the in-process field cache.
///
/// Generated fields never change once written, so entries have no
/// time-to-live. Idle entries are dropped to keep memory proportional
/// to traffic.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached fields.
    pub max_capacity: u64,

    /// Evict a field not read within this duration.
    pub time_to_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 20_000,
            time_to_idle: Some(Duration::from_secs(3600)), // 1 hour
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Keep entries until evicted by capacity.
    #[must_use]
    pub fn never_idle(mut self) -> Self {
        self.time_to_idle = None;
        self
    }

    #[must_use]
    pub fn idle_for(mut self, duration: Duration) -> Self {
        self.time_to_idle = Some(duration);
        self
    }

    /// Config from plain limits, `idle_secs == 0` meaning no idle eviction.
    pub fn from_limits(max_capacity: u64, idle_secs: u64) -> Self {
        let config = Self::with_capacity(max_capacity);
        if idle_secs == 0 {
            config.never_idle()
        } else {
            config.idle_for(Duration::from_secs(idle_secs))
        }
    }
}
