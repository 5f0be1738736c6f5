//! Request-path background operations orchestrator
//!
//! Invoked at the top of request handlers for contractor resources. Runs the
//! monthly reset synchronously (counters must be fresh before any limit check
//! in the same request), then fires the daily check and, on notification
//! routes, the cleanup trigger. Fail-open by design: a broken background step
//! is recorded in the report and the request proceeds.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cleanup::NotificationCleanupService;
use crate::daily::DailyCheckService;
use crate::reset::MonthlyResetService;

/// Which optional steps to run
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundOpsOptions {
    /// Also roll the notification-cleanup dice (notification routes only)
    pub run_cleanup: bool,
}

/// One captured sub-step failure
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsError {
    /// Which step failed ("monthly_reset", ...)
    pub source: &'static str,
    pub message: String,
}

impl fmt::Display for OpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// What ran (or failed) during one orchestrator pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundOpsReport {
    /// Whether the monthly reset actually zeroed counters on this pass
    pub monthly_reset: bool,
    pub daily_check_triggered: bool,
    pub cleanup_triggered: bool,
    pub errors: Vec<OpsError>,
}

impl BackgroundOpsReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn add_error(&mut self, source: &'static str, message: impl Into<String>) {
        self.errors.push(OpsError {
            source,
            message: message.into(),
        });
    }
}

/// Sequences the maintenance services for one contractor per request
pub struct BackgroundOps {
    reset: Arc<MonthlyResetService>,
    daily: Arc<DailyCheckService>,
    cleanup: Arc<NotificationCleanupService>,
}

impl BackgroundOps {
    pub fn new(
        reset: Arc<MonthlyResetService>,
        daily: Arc<DailyCheckService>,
        cleanup: Arc<NotificationCleanupService>,
    ) -> Self {
        Self {
            reset,
            daily,
            cleanup,
        }
    }

    /// Full orchestrator pass
    ///
    /// Never fails past its own boundary: sub-step failures land in
    /// `errors` and the calling request carries on with best-effort data.
    pub async fn run(
        &self,
        contractor_id: &str,
        options: BackgroundOpsOptions,
    ) -> BackgroundOpsReport {
        let mut report = BackgroundOpsReport::default();

        // Reset first and awaited: limit checks later in this request must
        // not see a stale period
        let outcome = self.reset.check_and_reset(contractor_id).await;
        report.monthly_reset = outcome.reset;
        if let Some(message) = outcome.error {
            report.add_error("monthly_reset", message);
        }

        report.daily_check_triggered = self.daily.trigger(contractor_id);

        if options.run_cleanup {
            report.cleanup_triggered = self.cleanup.maybe_trigger();
        }

        debug!(
            contractor_id,
            monthly_reset = report.monthly_reset,
            daily_check = report.daily_check_triggered,
            cleanup = report.cleanup_triggered,
            errors = report.errors.len(),
            "background ops pass complete"
        );

        report
    }

    /// Reset-only pass, for routes about to increment a period-scoped
    /// counter and needing a guaranteed-fresh baseline
    pub async fn run_reset_only(&self, contractor_id: &str) -> BackgroundOpsReport {
        let mut report = BackgroundOpsReport::default();
        let outcome = self.reset.check_and_reset(contractor_id).await;
        report.monthly_reset = outcome.reset;
        if let Some(message) = outcome.error {
            report.add_error("monthly_reset", message);
        }
        report
    }

    /// Daily-check-only pass, for read-only routes
    pub async fn run_daily_check_only(&self, contractor_id: &str) -> BackgroundOpsReport {
        BackgroundOpsReport {
            daily_check_triggered: self.daily.trigger(contractor_id),
            ..Default::default()
        }
    }
}
