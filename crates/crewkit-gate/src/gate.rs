//! Feature and limit gating decisions
//!
//! The public decision API request handlers call: feature-access checks,
//! single and batched limit checks, and the per-contractor usage overview.
//! All read-only; the only side effect is a fire-and-forget violation
//! observation when a counter sits at its ceiling.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{Feature, Limit, Tier};
use crate::error::GateError;
use crate::resolver::TierResolver;
use crate::stores::{LimitViolation, UsageCounters, UsageStore, ViolationSink};

/// Outcome of a feature-access check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccessResult {
    pub allowed: bool,
    pub feature: Feature,
    /// The contractor's resolved tier
    pub tier: Tier,
    /// Lowest tier that would grant the feature, when denied
    pub required: Option<Tier>,
    /// Upgrade-prompt message, when denied
    pub reason: Option<String>,
}

impl FeatureAccessResult {
    /// Turn a denial into the typed [`GateError::FeatureLocked`]
    pub fn require(&self) -> Result<(), GateError> {
        if self.allowed {
            return Ok(());
        }
        Err(GateError::FeatureLocked {
            feature: self.feature,
            required: self.required.unwrap_or(Tier::Enterprise),
        })
    }
}

/// Outcome of a usage-limit check
///
/// `limit`/`remaining` of `None` mean unlimited. `percentage` is the rounded
/// share of the ceiling in use, 0 for unlimited limits.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheckResult {
    pub allowed: bool,
    pub current: u64,
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub percentage: u32,
    pub approaching: bool,
    pub at_limit: bool,
}

impl LimitCheckResult {
    fn compute(current: u64, limit: Option<u64>) -> Self {
        let Some(max) = limit else {
            return Self {
                allowed: true,
                current,
                limit: None,
                remaining: None,
                percentage: 0,
                approaching: false,
                at_limit: false,
            };
        };

        // max == 0 means the counter's feature is not on the plan at all
        let percentage = if max == 0 {
            100
        } else {
            (current as f64 / max as f64 * 100.0).round() as u32
        };

        Self {
            allowed: current < max,
            current,
            limit: Some(max),
            remaining: Some(max.saturating_sub(current)),
            percentage,
            approaching: (80..100).contains(&percentage),
            at_limit: current >= max,
        }
    }

    /// Turn a denial into the typed [`GateError::LimitExceeded`]
    pub fn require(&self, limit: Limit) -> Result<(), GateError> {
        if self.allowed {
            return Ok(());
        }
        Err(GateError::LimitExceeded {
            limit,
            current: self.current,
            max: self.limit.unwrap_or(0),
        })
    }
}

/// Tier metadata plus a snapshot of every tracked limit, for dashboards
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOverview {
    pub tier: Tier,
    pub tier_name: &'static str,
    pub monthly_price: f64,
    pub usage: BTreeMap<Limit, LimitCheckResult>,
}

/// The gating decision API
pub struct FeatureGate {
    resolver: Arc<TierResolver>,
    usage: Arc<dyn UsageStore>,
    violations: Arc<dyn ViolationSink>,
}

impl FeatureGate {
    pub fn new(
        resolver: Arc<TierResolver>,
        usage: Arc<dyn UsageStore>,
        violations: Arc<dyn ViolationSink>,
    ) -> Self {
        Self {
            resolver,
            usage,
            violations,
        }
    }

    /// Whether the contractor's tier includes a feature
    ///
    /// A denial carries the lowest tier that would grant the feature so the
    /// UI can render an upgrade prompt. Never mutates state.
    pub async fn can_access_feature(
        &self,
        contractor_id: &str,
        feature: Feature,
    ) -> Result<FeatureAccessResult, GateError> {
        let tier = self.resolver.resolve(contractor_id).await?;

        if tier.has_feature(feature) {
            return Ok(FeatureAccessResult {
                allowed: true,
                feature,
                tier,
                required: None,
                reason: None,
            });
        }

        let required = Tier::minimum_for(feature);
        debug!(contractor_id, %feature, %tier, required = %required, "feature denied");

        Ok(FeatureAccessResult {
            allowed: false,
            feature,
            tier,
            required: Some(required),
            reason: Some(format!(
                "{feature} requires the {} plan or higher",
                required.display_name()
            )),
        })
    }

    /// Check one usage counter against the contractor's tier ceiling
    ///
    /// A contractor without a usage row reads as zero on every counter.
    pub async fn check_limit(
        &self,
        contractor_id: &str,
        limit: Limit,
    ) -> Result<LimitCheckResult, GateError> {
        let tier = self.resolver.resolve(contractor_id).await?;
        let counters = self.current_counters(contractor_id).await?;
        Ok(self.evaluate(contractor_id, tier, &counters, limit))
    }

    /// Check several limits with exactly one tier resolve and one usage read
    ///
    /// Callers needing more than one limit for the same contractor in the
    /// same operation must use this instead of repeated `check_limit` calls.
    pub async fn check_multiple_limits(
        &self,
        contractor_id: &str,
        limits: &[Limit],
    ) -> Result<BTreeMap<Limit, LimitCheckResult>, GateError> {
        let tier = self.resolver.resolve(contractor_id).await?;
        let counters = self.current_counters(contractor_id).await?;

        Ok(limits
            .iter()
            .map(|&limit| (limit, self.evaluate(contractor_id, tier, &counters, limit)))
            .collect())
    }

    /// Tier metadata plus a check result for every tracked limit
    pub async fn usage_overview(&self, contractor_id: &str) -> Result<UsageOverview, GateError> {
        let tier = self.resolver.resolve(contractor_id).await?;
        let counters = self.current_counters(contractor_id).await?;

        let usage = Limit::ALL
            .into_iter()
            .map(|limit| (limit, self.evaluate(contractor_id, tier, &counters, limit)))
            .collect();

        Ok(UsageOverview {
            tier,
            tier_name: tier.display_name(),
            monthly_price: tier.monthly_price(),
            usage,
        })
    }

    async fn current_counters(&self, contractor_id: &str) -> Result<UsageCounters, GateError> {
        Ok(self
            .usage
            .get_counters(contractor_id)
            .await?
            .unwrap_or_default())
    }

    fn evaluate(
        &self,
        contractor_id: &str,
        tier: Tier,
        counters: &UsageCounters,
        limit: Limit,
    ) -> LimitCheckResult {
        let result = LimitCheckResult::compute(counters.get(limit), tier.limits().get(limit));
        if result.at_limit {
            self.emit_violation(contractor_id, tier, limit, &result);
        }
        result
    }

    /// Hand the violation to the monitoring sink without blocking the check
    fn emit_violation(
        &self,
        contractor_id: &str,
        tier: Tier,
        limit: Limit,
        result: &LimitCheckResult,
    ) {
        let violation = LimitViolation {
            contractor_id: contractor_id.to_string(),
            limit,
            current: result.current,
            limit_value: result.limit.unwrap_or(0),
            tier,
            timestamp: Utc::now(),
        };

        let sink = Arc::clone(&self.violations);
        tokio::spawn(async move {
            if let Err(e) = sink.log_limit_violation(violation).await {
                debug!(error = %e, "limit violation log failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::error::StoreError;
    use crate::memory::{InMemoryAccountStore, InMemoryUsageStore, RecordingViolationSink};
    use crate::stores::{AccountStore, ContractorAccount};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct Fixture {
        usage: Arc<InMemoryUsageStore>,
        sink: Arc<RecordingViolationSink>,
        gate: FeatureGate,
    }

    fn fixture(tier: &str) -> Fixture {
        let accounts = Arc::new(InMemoryAccountStore::new());
        accounts.upsert(ContractorAccount {
            contractor_id: "c-1".to_string(),
            subscription_tier: tier.to_string(),
            billing_anchor: Utc::now(),
        });

        let usage = Arc::new(InMemoryUsageStore::new());
        let sink = Arc::new(RecordingViolationSink::new());
        let resolver = Arc::new(TierResolver::new(
            Arc::clone(&accounts) as Arc<dyn AccountStore>,
            &GateConfig::default(),
        ));
        let gate = FeatureGate::new(
            resolver,
            Arc::clone(&usage) as Arc<dyn UsageStore>,
            Arc::clone(&sink) as Arc<dyn ViolationSink>,
        );

        Fixture { usage, sink, gate }
    }

    async fn settle() {
        // Let fire-and-forget violation tasks run
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }

    #[test]
    fn test_compute_unlimited() {
        let result = LimitCheckResult::compute(1_000_000, None);
        assert!(result.allowed);
        assert_eq!(result.remaining, None);
        assert_eq!(result.percentage, 0);
        assert!(!result.approaching);
        assert!(!result.at_limit);
    }

    #[test]
    fn test_compute_approaching_boundary() {
        // 12 of 15 = 80%, the approaching threshold
        let result = LimitCheckResult::compute(12, Some(15));
        assert!(result.allowed);
        assert_eq!(result.remaining, Some(3));
        assert_eq!(result.percentage, 80);
        assert!(result.approaching);
        assert!(!result.at_limit);
    }

    #[test]
    fn test_compute_at_limit() {
        let result = LimitCheckResult::compute(15, Some(15));
        assert!(!result.allowed);
        assert_eq!(result.remaining, Some(0));
        assert_eq!(result.percentage, 100);
        assert!(!result.approaching);
        assert!(result.at_limit);
    }

    #[test]
    fn test_compute_over_limit() {
        let result = LimitCheckResult::compute(20, Some(15));
        assert!(!result.allowed);
        assert_eq!(result.remaining, Some(0));
        assert_eq!(result.percentage, 133);
        assert!(result.at_limit);
    }

    #[test]
    fn test_compute_rounds_percentage() {
        assert_eq!(LimitCheckResult::compute(1, Some(3)).percentage, 33);
        assert_eq!(LimitCheckResult::compute(2, Some(3)).percentage, 67);
    }

    #[test]
    fn test_compute_zero_limit_means_unavailable() {
        let result = LimitCheckResult::compute(0, Some(0));
        assert!(!result.allowed);
        assert!(result.at_limit);
        assert_eq!(result.percentage, 100);
    }

    #[test]
    fn test_result_serializes_null_for_unlimited() {
        let result = LimitCheckResult::compute(5, None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["limit"], serde_json::Value::Null);
        assert_eq!(json["remaining"], serde_json::Value::Null);
        assert_eq!(json["atLimit"], serde_json::Value::Bool(false));
    }

    #[tokio::test]
    async fn test_feature_allowed() {
        let fx = fixture("pro");
        let result = fx
            .gate
            .can_access_feature("c-1", Feature::AdvancedReports)
            .await
            .unwrap();
        assert!(result.allowed);
        assert_eq!(result.tier, Tier::Pro);
        assert!(result.reason.is_none());
        assert!(result.require().is_ok());
    }

    #[tokio::test]
    async fn test_feature_denied_names_required_tier() {
        let fx = fixture("starter");
        let result = fx
            .gate
            .can_access_feature("c-1", Feature::CustomerPortal)
            .await
            .unwrap();
        assert!(!result.allowed);
        assert_eq!(result.required, Some(Tier::Pro));
        assert_eq!(
            result.reason.as_deref(),
            Some("customer_portal requires the Pro plan or higher")
        );
        assert!(matches!(
            result.require(),
            Err(GateError::FeatureLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_check_limit_starter_scenario() {
        let fx = fixture("starter");
        fx.usage.set_counters(
            "c-1",
            UsageCounters {
                active_jobs: 12,
                ..Default::default()
            },
        );

        let result = fx.gate.check_limit("c-1", Limit::ActiveJobs).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, Some(3));
        assert_eq!(result.percentage, 80);
        assert!(result.approaching);
        assert!(!result.at_limit);

        settle().await;
        assert_eq!(fx.sink.count(), 0);
    }

    #[tokio::test]
    async fn test_check_limit_emits_one_violation_at_limit() {
        let fx = fixture("starter");
        fx.usage.set_counters(
            "c-1",
            UsageCounters {
                active_jobs: 15,
                ..Default::default()
            },
        );

        let result = fx.gate.check_limit("c-1", Limit::ActiveJobs).await.unwrap();
        assert!(!result.allowed);
        assert!(result.at_limit);
        assert_eq!(result.percentage, 100);

        settle().await;
        let violations = fx.sink.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].limit, Limit::ActiveJobs);
        assert_eq!(violations[0].current, 15);
        assert_eq!(violations[0].limit_value, 15);
        assert_eq!(violations[0].tier, Tier::Starter);
    }

    #[tokio::test]
    async fn test_missing_usage_row_reads_as_zero() {
        let fx = fixture("starter");
        let results = fx
            .gate
            .check_multiple_limits("c-1", &Limit::ALL)
            .await
            .unwrap();
        for (limit, result) in &results {
            assert_eq!(result.current, 0, "{limit}");
            assert!(result.allowed, "{limit}");
        }
    }

    #[tokio::test]
    async fn test_unknown_contractor_propagates() {
        let fx = fixture("starter");
        let err = fx
            .gate
            .check_limit("ghost", Limit::ActiveJobs)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::ContractorNotFound { .. }));
    }

    #[tokio::test]
    async fn test_enterprise_always_allowed() {
        let fx = fixture("enterprise");
        fx.usage.set_counters(
            "c-1",
            UsageCounters {
                active_jobs: 100_000,
                ..Default::default()
            },
        );

        let result = fx.gate.check_limit("c-1", Limit::ActiveJobs).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, None);
        assert_eq!(result.percentage, 0);

        settle().await;
        assert_eq!(fx.sink.count(), 0);
    }

    /// Usage store wrapper that counts reads
    struct CountingUsageStore {
        inner: Arc<InMemoryUsageStore>,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl UsageStore for CountingUsageStore {
        async fn get_counters(
            &self,
            contractor_id: &str,
        ) -> Result<Option<UsageCounters>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_counters(contractor_id).await
        }

        async fn period_start(
            &self,
            contractor_id: &str,
        ) -> Result<Option<DateTime<Utc>>, StoreError> {
            self.inner.period_start(contractor_id).await
        }

        async fn reset_period(
            &self,
            contractor_id: &str,
            period_start: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.reset_period(contractor_id, period_start).await
        }
    }

    #[tokio::test]
    async fn test_batch_check_issues_single_usage_read() {
        let accounts = Arc::new(InMemoryAccountStore::new());
        accounts.upsert(ContractorAccount {
            contractor_id: "c-1".to_string(),
            subscription_tier: "pro".to_string(),
            billing_anchor: Utc::now(),
        });

        let usage = Arc::new(CountingUsageStore {
            inner: Arc::new(InMemoryUsageStore::new()),
            reads: AtomicUsize::new(0),
        });
        let resolver = Arc::new(TierResolver::new(
            accounts as Arc<dyn AccountStore>,
            &GateConfig::default(),
        ));
        let gate = FeatureGate::new(
            resolver,
            Arc::clone(&usage) as Arc<dyn UsageStore>,
            Arc::new(RecordingViolationSink::new()),
        );

        let results = gate.check_multiple_limits("c-1", &Limit::ALL).await.unwrap();
        assert_eq!(results.len(), Limit::ALL.len());
        assert_eq!(usage.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_usage_overview_covers_all_limits() {
        let fx = fixture("basic");
        fx.usage.set_counters(
            "c-1",
            UsageCounters {
                total_customers: 50,
                ..Default::default()
            },
        );

        let overview = fx.gate.usage_overview("c-1").await.unwrap();
        assert_eq!(overview.tier, Tier::Starter);
        assert_eq!(overview.tier_name, "Starter");
        assert_eq!(overview.monthly_price, 29.0);
        assert_eq!(overview.usage.len(), Limit::ALL.len());
        assert_eq!(
            overview.usage[&Limit::TotalCustomers].percentage,
            50,
            "50 of 100 customers"
        );
    }
}
