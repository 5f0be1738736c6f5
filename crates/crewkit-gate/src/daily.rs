//! Per-contractor daily usage check
//!
//! Called on every request but does real work at most once per contractor per
//! UTC calendar day: a snapshot of all tracked limits, logging counters that
//! are approaching or at their ceiling. The check runs fire-and-forget; the
//! caller awaits only the triggering decision.
//!
//! Both the day marker and the in-flight set are process-local: after a
//! restart the next request simply re-runs the (idempotent) check.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::catalog::Limit;
use crate::error::GateError;
use crate::gate::FeatureGate;

/// Triggers the daily usage/notification check when one is due
pub struct DailyCheckService {
    gate: Arc<FeatureGate>,
    /// UTC day of the last successful check per contractor
    last_checked: DashMap<String, NaiveDate>,
    /// Single-flight guard: contractors with a check currently running
    in_flight: DashMap<String, ()>,
}

impl DailyCheckService {
    pub fn new(gate: Arc<FeatureGate>) -> Self {
        Self {
            gate,
            last_checked: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Spawn the daily check if one is due for this contractor
    ///
    /// Returns whether a check was actually started. At most one check runs
    /// per contractor at a time; the day marker is recorded only after a
    /// successful run, so a failed check is retried on the next request.
    pub fn trigger(self: &Arc<Self>, contractor_id: &str) -> bool {
        let today = Utc::now().date_naive();
        if self
            .last_checked
            .get(contractor_id)
            .is_some_and(|day| *day == today)
        {
            return false;
        }

        if self
            .in_flight
            .insert(contractor_id.to_string(), ())
            .is_some()
        {
            // Another request already kicked it off
            return false;
        }

        let service = Arc::clone(self);
        let contractor_id = contractor_id.to_string();
        tokio::spawn(async move {
            match service.run_check(&contractor_id).await {
                Ok(()) => {
                    service
                        .last_checked
                        .insert(contractor_id.clone(), Utc::now().date_naive());
                }
                Err(e) => {
                    warn!(contractor_id = %contractor_id, error = %e, "daily usage check failed");
                }
            }
            service.in_flight.remove(&contractor_id);
        });

        true
    }

    /// Whether a successful check has already run today
    pub fn checked_today(&self, contractor_id: &str) -> bool {
        let today = Utc::now().date_naive();
        self.last_checked
            .get(contractor_id)
            .is_some_and(|day| *day == today)
    }

    async fn run_check(&self, contractor_id: &str) -> Result<(), GateError> {
        let snapshot = self
            .gate
            .check_multiple_limits(contractor_id, &Limit::ALL)
            .await?;

        for (limit, check) in &snapshot {
            if check.at_limit {
                warn!(
                    contractor_id,
                    limit = %limit,
                    current = check.current,
                    "daily check: counter at its limit"
                );
            } else if check.approaching {
                info!(
                    contractor_id,
                    limit = %limit,
                    current = check.current,
                    percentage = check.percentage,
                    "daily check: counter approaching its limit"
                );
            }
        }

        debug!(contractor_id, "daily usage check complete");
        Ok(())
    }
}
