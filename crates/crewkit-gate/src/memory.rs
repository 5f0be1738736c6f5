//! In-memory store implementations
//!
//! `DashMap`-backed implementations of every storage port. Used by the test
//! suite and by single-process embedders; they are also the reference for
//! the semantics a database-backed implementation must provide.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::stores::{
    AccountStore, ContractorAccount, LimitViolation, NotificationRecord, NotificationStore,
    UsageCounters, UsageStore, ViolationSink,
};

/// In-memory account store
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<String, ContractorAccount>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub fn upsert(&self, account: ContractorAccount) {
        self.accounts
            .insert(account.contractor_id.clone(), account);
    }

    /// Change a contractor's stored tier string
    ///
    /// Callers that change a tier must also invalidate the tier cache,
    /// otherwise the old tier can be served until the TTL lapses.
    pub fn set_tier(&self, contractor_id: &str, raw_tier: impl Into<String>) {
        if let Some(mut account) = self.accounts.get_mut(contractor_id) {
            account.subscription_tier = raw_tier.into();
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_account(
        &self,
        contractor_id: &str,
    ) -> Result<Option<ContractorAccount>, StoreError> {
        Ok(self.accounts.get(contractor_id).map(|a| a.clone()))
    }
}

/// Usage row: counters plus the billing-period marker they were last reset for
#[derive(Debug, Clone, Copy, Default)]
struct UsageRow {
    counters: UsageCounters,
    period_start: Option<DateTime<Utc>>,
}

/// In-memory usage store
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    rows: DashMap<String, UsageRow>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a contractor's counters, creating the row if needed
    pub fn set_counters(&self, contractor_id: &str, counters: UsageCounters) {
        self.rows
            .entry(contractor_id.to_string())
            .or_default()
            .counters = counters;
    }

    /// Overwrite the period marker, creating the row if needed
    pub fn set_period_start(&self, contractor_id: &str, period_start: DateTime<Utc>) {
        self.rows
            .entry(contractor_id.to_string())
            .or_default()
            .period_start = Some(period_start);
    }

    /// Snapshot a contractor's counters, `None` if there is no row
    pub fn counters(&self, contractor_id: &str) -> Option<UsageCounters> {
        self.rows.get(contractor_id).map(|row| row.counters)
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn get_counters(&self, contractor_id: &str) -> Result<Option<UsageCounters>, StoreError> {
        Ok(self.rows.get(contractor_id).map(|row| row.counters))
    }

    async fn period_start(
        &self,
        contractor_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.rows.get(contractor_id).and_then(|row| row.period_start))
    }

    async fn reset_period(
        &self,
        contractor_id: &str,
        period_start: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut row = self.rows.entry(contractor_id.to_string()).or_default();
        row.counters.invoices_this_month = 0;
        row.period_start = Some(period_start);
        Ok(())
    }
}

/// In-memory notification store
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    rows: DashMap<String, NotificationRecord>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: NotificationRecord) {
        self.rows.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<NotificationRecord> {
        self.rows.get(id).map(|r| r.clone())
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn archive_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut archived = 0u64;
        for mut entry in self.rows.iter_mut() {
            if !entry.archived && entry.created_at < cutoff {
                entry.archived = true;
                archived += 1;
            }
        }
        Ok(archived)
    }

    async fn delete_read_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<u64, StoreError> {
        let doomed: Vec<String> = self
            .rows
            .iter()
            .filter(|entry| entry.read && entry.created_at < cutoff)
            .take(limit)
            .map(|entry| entry.id.clone())
            .collect();

        let mut deleted = 0u64;
        for id in doomed {
            if self.rows.remove(&id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Default monitoring sink: structured warning per violation
///
/// Real deployments point the sink at their monitoring pipeline; the tracing
/// sink keeps violations visible without one.
#[derive(Debug, Default)]
pub struct TracingViolationSink;

#[async_trait]
impl ViolationSink for TracingViolationSink {
    async fn log_limit_violation(&self, violation: LimitViolation) -> Result<(), StoreError> {
        warn!(
            contractor_id = %violation.contractor_id,
            limit = %violation.limit,
            current = violation.current,
            max = violation.limit_value,
            tier = %violation.tier,
            "usage limit violation"
        );
        Ok(())
    }
}

/// Recording sink for assertions on violation emission
#[derive(Debug, Default)]
pub struct RecordingViolationSink {
    violations: Mutex<Vec<LimitViolation>>,
}

impl RecordingViolationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> Vec<LimitViolation> {
        self.violations.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.violations.lock().len()
    }
}

#[async_trait]
impl ViolationSink for RecordingViolationSink {
    async fn log_limit_violation(&self, violation: LimitViolation) -> Result<(), StoreError> {
        self.violations.lock().push(violation);
        Ok(())
    }
}
