//! Tier resolution with an in-process TTL cache
//!
//! Resolving a tier normally costs an account-store round trip; the cache
//! bounds that to once per contractor per TTL window. Entries are replaced
//! atomically, so concurrent requests can at worst observe staleness (bounded
//! by the TTL), never a torn entry. The cache is per-process: in a
//! multi-instance deployment each instance converges independently within
//! the TTL unless `invalidate` is called on the instance serving the change.

use std::sync::Arc;

use moka::future::Cache;
use tracing::{debug, trace};

use crate::catalog::Tier;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::stores::AccountStore;

/// Resolves a contractor's current tier, cached with a TTL
pub struct TierResolver {
    accounts: Arc<dyn AccountStore>,
    cache: Cache<String, Tier>,
}

impl TierResolver {
    pub fn new(accounts: Arc<dyn AccountStore>, config: &GateConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_cached_tiers)
            .time_to_live(config.tier_cache_ttl)
            .build();

        Self { accounts, cache }
    }

    /// Resolve the contractor's current tier
    ///
    /// Cache hit within the TTL returns immediately; otherwise the account is
    /// loaded, its tier string normalized, and the result cached. An unknown
    /// contractor is a hard [`GateError::ContractorNotFound`] — never a
    /// Starter default — and is not cached, so a freshly created account is
    /// visible on the next call.
    pub async fn resolve(&self, contractor_id: &str) -> Result<Tier, GateError> {
        if let Some(tier) = self.cache.get(contractor_id).await {
            trace!(contractor_id, %tier, "tier cache hit");
            return Ok(tier);
        }

        let account = self
            .accounts
            .get_account(contractor_id)
            .await?
            .ok_or_else(|| GateError::not_found(contractor_id))?;

        let tier = Tier::from_raw(&account.subscription_tier);
        self.cache.insert(contractor_id.to_string(), tier).await;
        debug!(contractor_id, %tier, raw = %account.subscription_tier, "tier resolved");

        Ok(tier)
    }

    /// Drop one contractor's cached tier
    ///
    /// Must be called synchronously with any tier change, otherwise the old
    /// tier can be served for up to the TTL.
    pub async fn invalidate(&self, contractor_id: &str) {
        self.cache.invalidate(contractor_id).await;
        debug!(contractor_id, "tier cache entry invalidated");
    }

    /// Empty the cache (tests, admin resets)
    pub fn clear_all(&self) {
        self.cache.invalidate_all();
        debug!("tier cache cleared");
    }
}
