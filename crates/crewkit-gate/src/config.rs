//! Configuration for the gating subsystem

use std::time::Duration;

/// Tuning knobs for the gate, cache, and maintenance services
///
/// Defaults match production behavior; tests shrink the TTL and thresholds
/// to keep runs fast.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long a resolved tier stays valid in the in-process cache.
    ///
    /// Tier changes propagate within this window at the latest; code paths
    /// that change a tier should call `invalidate_cache` for immediate effect.
    pub tier_cache_ttl: Duration,

    /// Maximum number of cached tier entries
    pub max_cached_tiers: u64,

    /// Per-invocation probability that a notification sweep is started
    pub cleanup_probability: f64,

    /// Rows deleted per batch during the cleanup delete phase
    pub cleanup_batch_size: usize,

    /// Notifications older than this many days are archived
    pub archive_after_days: i64,

    /// Read notifications older than this many days are hard-deleted
    pub delete_read_after_days: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            tier_cache_ttl: Duration::from_secs(300),
            max_cached_tiers: 10_000,
            cleanup_probability: 0.01,
            cleanup_batch_size: 100,
            archive_after_days: 30,
            delete_read_after_days: 7,
        }
    }
}

impl GateConfig {
    /// Archive cutoff age as a chrono duration
    pub(crate) fn archive_after(&self) -> chrono::Duration {
        chrono::Duration::days(self.archive_after_days)
    }

    /// Delete cutoff age as a chrono duration
    pub(crate) fn delete_read_after(&self) -> chrono::Duration {
        chrono::Duration::days(self.delete_read_after_days)
    }
}
