//! Monthly billing-period counter reset
//!
//! Runs at the top of every gated request, before usage is read. Detects
//! whether the contractor's billing period has rolled over and, if so, zeroes
//! the period-scoped counters and records the new period marker. The reset
//! write is a last-writer-wins set, so concurrent requests racing through the
//! stale window converge on the same state.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GateError;
use crate::stores::{AccountStore, UsageStore};

/// Result of a reset check
///
/// Errors are captured rather than returned as `Err`: the check sits on the
/// blocking path of every gated request, and a transient storage failure must
/// degrade to "reset state unknown" instead of failing the request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    /// Whether a reset was performed on this call
    pub reset: bool,
    pub error: Option<String>,
}

/// Start of the billing period containing `now`, for an account anchored at
/// `anchor`
///
/// The period begins on the anchor's day-of-month, clamped to the last day of
/// short months (an account created Jan 31 rolls over on Feb 28/29, Mar 31,
/// Apr 30, ...). Returned as midnight UTC of that day.
pub fn billing_period_start(anchor: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let anchor_day = anchor.day();
    let today = now.date_naive();

    let this_month = clamped_date(today.year(), today.month(), anchor_day);
    let start = if this_month <= today {
        this_month
    } else {
        let (year, month) = previous_month(today.year(), today.month());
        clamped_date(year, month, anchor_day)
    };

    start
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    // Always valid once the day is clamped
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Detects billing-period rollover and zeroes period-scoped counters once
/// per period
pub struct MonthlyResetService {
    accounts: Arc<dyn AccountStore>,
    usage: Arc<dyn UsageStore>,
}

impl MonthlyResetService {
    pub fn new(accounts: Arc<dyn AccountStore>, usage: Arc<dyn UsageStore>) -> Self {
        Self { accounts, usage }
    }

    /// Reset period-scoped counters if the stored period marker is stale
    ///
    /// Idempotent: once the marker matches the current period, further calls
    /// are read-only no-ops returning `reset = false`. Safe under concurrent
    /// invocation because the underlying write is a last-writer-wins set of
    /// identical values.
    pub async fn check_and_reset(&self, contractor_id: &str) -> ResetOutcome {
        match self.try_check_and_reset(contractor_id).await {
            Ok(reset) => ResetOutcome { reset, error: None },
            Err(e) => {
                warn!(contractor_id, error = %e, "monthly reset check failed");
                ResetOutcome {
                    reset: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_check_and_reset(&self, contractor_id: &str) -> Result<bool, GateError> {
        let account = self
            .accounts
            .get_account(contractor_id)
            .await?
            .ok_or_else(|| GateError::not_found(contractor_id))?;

        let current_start = billing_period_start(account.billing_anchor, Utc::now());
        let stored = self.usage.period_start(contractor_id).await?;

        let stale = stored.map_or(true, |marker| marker < current_start);
        if !stale {
            return Ok(false);
        }

        self.usage.reset_period(contractor_id, current_start).await?;
        info!(contractor_id, period_start = %current_start, "period counters reset");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryAccountStore, InMemoryUsageStore};
    use crate::stores::{ContractorAccount, UsageCounters};
    use chrono::{Duration, TimeZone};

    fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_period_start_anchor_day_passed() {
        let anchor = utc(2025, 3, 10);
        assert_eq!(
            billing_period_start(anchor, utc(2026, 6, 15)),
            midnight(2026, 6, 10)
        );
    }

    #[test]
    fn test_period_start_anchor_day_today() {
        let anchor = utc(2025, 3, 10);
        assert_eq!(
            billing_period_start(anchor, utc(2026, 6, 10)),
            midnight(2026, 6, 10)
        );
    }

    #[test]
    fn test_period_start_anchor_day_upcoming_uses_previous_month() {
        let anchor = utc(2025, 3, 25);
        assert_eq!(
            billing_period_start(anchor, utc(2026, 6, 10)),
            midnight(2026, 5, 25)
        );
    }

    #[test]
    fn test_period_start_january_rolls_to_previous_year() {
        let anchor = utc(2025, 3, 25);
        assert_eq!(
            billing_period_start(anchor, utc(2026, 1, 10)),
            midnight(2025, 12, 25)
        );
    }

    #[test]
    fn test_period_start_clamps_short_months() {
        let anchor = utc(2025, 1, 31);
        // February 2026 has 28 days
        assert_eq!(
            billing_period_start(anchor, utc(2026, 2, 28)),
            midnight(2026, 2, 28)
        );
        // Leap-year February has 29
        assert_eq!(
            billing_period_start(anchor, utc(2028, 2, 29)),
            midnight(2028, 2, 29)
        );
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(days_in_month(2026, 4), 30);
    }

    struct Fixture {
        usage: Arc<InMemoryUsageStore>,
        service: MonthlyResetService,
    }

    fn fixture(anchor: DateTime<Utc>) -> Fixture {
        let accounts = Arc::new(InMemoryAccountStore::new());
        accounts.upsert(ContractorAccount {
            contractor_id: "c-1".to_string(),
            subscription_tier: "starter".to_string(),
            billing_anchor: anchor,
        });
        let usage = Arc::new(InMemoryUsageStore::new());
        let service = MonthlyResetService::new(
            Arc::clone(&accounts) as Arc<dyn AccountStore>,
            Arc::clone(&usage) as Arc<dyn UsageStore>,
        );
        Fixture { usage, service }
    }

    #[tokio::test]
    async fn test_stale_marker_triggers_reset_once() {
        let fx = fixture(Utc::now() - Duration::days(90));
        fx.usage.set_counters(
            "c-1",
            UsageCounters {
                invoices_this_month: 18,
                active_jobs: 6,
                ..Default::default()
            },
        );
        fx.usage
            .set_period_start("c-1", Utc::now() - Duration::days(60));

        let outcome = fx.service.check_and_reset("c-1").await;
        assert!(outcome.reset);
        assert!(outcome.error.is_none());

        let counters = fx.usage.counters("c-1").unwrap();
        assert_eq!(counters.invoices_this_month, 0);
        assert_eq!(counters.active_jobs, 6, "gauges survive the reset");

        // Same period: second call is a no-op
        let outcome = fx.service.check_and_reset("c-1").await;
        assert!(!outcome.reset);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_missing_usage_row_counts_as_stale() {
        let fx = fixture(Utc::now() - Duration::days(45));
        let outcome = fx.service.check_and_reset("c-1").await;
        assert!(outcome.reset);
        assert!(fx.usage.counters("c-1").is_some());
    }

    #[tokio::test]
    async fn test_unknown_contractor_captured_as_error() {
        let fx = fixture(Utc::now());
        let outcome = fx.service.check_and_reset("ghost").await;
        assert!(!outcome.reset);
        assert_eq!(
            outcome.error.as_deref(),
            Some("contractor not found: ghost")
        );
    }

    #[tokio::test]
    async fn test_current_marker_is_left_alone() {
        let anchor = Utc::now() - Duration::days(400);
        let fx = fixture(anchor);
        let current = billing_period_start(anchor, Utc::now());
        fx.usage.set_period_start("c-1", current);
        fx.usage.set_counters(
            "c-1",
            UsageCounters {
                invoices_this_month: 4,
                ..Default::default()
            },
        );

        let outcome = fx.service.check_and_reset("c-1").await;
        assert!(!outcome.reset);
        assert_eq!(fx.usage.counters("c-1").unwrap().invoices_this_month, 4);
    }
}
