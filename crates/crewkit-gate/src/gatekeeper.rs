//! Wiring façade for the gating subsystem
//!
//! Builds the resolver, gate, and maintenance services from the four storage
//! ports plus a config, and re-exposes the surface request handlers call.
//! Embedders that want the pieces à la carte can construct them directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{Feature, Limit};
use crate::cleanup::{CleanupStats, NotificationCleanupService};
use crate::config::GateConfig;
use crate::daily::DailyCheckService;
use crate::error::GateError;
use crate::gate::{FeatureAccessResult, FeatureGate, LimitCheckResult, UsageOverview};
use crate::memory::TracingViolationSink;
use crate::ops::{BackgroundOps, BackgroundOpsOptions, BackgroundOpsReport};
use crate::reset::MonthlyResetService;
use crate::resolver::TierResolver;
use crate::stores::{AccountStore, NotificationStore, UsageStore, ViolationSink};

/// One handle over the whole subsystem
pub struct Gatekeeper {
    config: GateConfig,
    resolver: Arc<TierResolver>,
    gate: Arc<FeatureGate>,
    cleanup: Arc<NotificationCleanupService>,
    ops: BackgroundOps,
}

impl Gatekeeper {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        usage: Arc<dyn UsageStore>,
        notifications: Arc<dyn NotificationStore>,
        violations: Arc<dyn ViolationSink>,
        config: GateConfig,
    ) -> Self {
        let resolver = Arc::new(TierResolver::new(Arc::clone(&accounts), &config));
        let gate = Arc::new(FeatureGate::new(
            Arc::clone(&resolver),
            Arc::clone(&usage),
            violations,
        ));
        let reset = Arc::new(MonthlyResetService::new(accounts, usage));
        let daily = Arc::new(DailyCheckService::new(Arc::clone(&gate)));
        let cleanup = Arc::new(NotificationCleanupService::new(notifications, &config));
        let ops = BackgroundOps::new(reset, daily, Arc::clone(&cleanup));

        Self {
            config,
            resolver,
            gate,
            cleanup,
            ops,
        }
    }

    /// Default config and the tracing violation sink
    pub fn with_defaults(
        accounts: Arc<dyn AccountStore>,
        usage: Arc<dyn UsageStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self::new(
            accounts,
            usage,
            notifications,
            Arc::new(TracingViolationSink),
            GateConfig::default(),
        )
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The decision API, for callers that want it directly
    pub fn gate(&self) -> &FeatureGate {
        &self.gate
    }

    /// The orchestrator, for callers that want it directly
    pub fn ops(&self) -> &BackgroundOps {
        &self.ops
    }

    // ===================
    // Request-path surface
    // ===================

    pub async fn run_background_ops(
        &self,
        contractor_id: &str,
        options: BackgroundOpsOptions,
    ) -> BackgroundOpsReport {
        self.ops.run(contractor_id, options).await
    }

    pub async fn run_reset_only(&self, contractor_id: &str) -> BackgroundOpsReport {
        self.ops.run_reset_only(contractor_id).await
    }

    pub async fn run_daily_check_only(&self, contractor_id: &str) -> BackgroundOpsReport {
        self.ops.run_daily_check_only(contractor_id).await
    }

    pub async fn can_access_feature(
        &self,
        contractor_id: &str,
        feature: Feature,
    ) -> Result<FeatureAccessResult, GateError> {
        self.gate.can_access_feature(contractor_id, feature).await
    }

    pub async fn check_limit(
        &self,
        contractor_id: &str,
        limit: Limit,
    ) -> Result<LimitCheckResult, GateError> {
        self.gate.check_limit(contractor_id, limit).await
    }

    pub async fn check_multiple_limits(
        &self,
        contractor_id: &str,
        limits: &[Limit],
    ) -> Result<BTreeMap<Limit, LimitCheckResult>, GateError> {
        self.gate.check_multiple_limits(contractor_id, limits).await
    }

    pub async fn usage_overview(&self, contractor_id: &str) -> Result<UsageOverview, GateError> {
        self.gate.usage_overview(contractor_id).await
    }

    // ===================
    // Administrative surface
    // ===================

    /// Drop one contractor's cached tier; call on any tier change
    pub async fn invalidate_cache(&self, contractor_id: &str) {
        self.resolver.invalidate(contractor_id).await;
    }

    /// Empty the tier cache
    pub fn clear_cache(&self) {
        self.resolver.clear_all();
    }

    /// Run a notification sweep synchronously
    pub async fn force_cleanup(&self) -> Result<CleanupStats, GateError> {
        self.cleanup.force_cleanup().await
    }
}
