//! Storage ports and the domain types they exchange
//!
//! Persistence lives outside this crate. The gate talks to its collaborators
//! through these traits; `memory` provides `DashMap`-backed implementations
//! for tests and single-process embedders, real deployments back them with
//! their database layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Limit, Tier};
use crate::error::StoreError;

/// Contractor account fields the gate reads
///
/// Owned by the billing/account subsystem; this crate never writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorAccount {
    pub contractor_id: String,
    /// Raw stored tier string; normalized via [`Tier::from_raw`] on read
    pub subscription_tier: String,
    /// Billing-period anchor, typically the account creation instant
    pub billing_anchor: DateTime<Utc>,
}

/// Current-period usage counters for one contractor
///
/// `invoices_this_month` is period-scoped and zeroed at each billing-period
/// boundary. `active_jobs` and `active_leads` are live gauges maintained by
/// the features that open/close jobs and leads; the remaining counters are
/// cumulative and only decrease on removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub active_jobs: u64,
    pub invoices_this_month: u64,
    pub total_customers: u64,
    pub team_members: u64,
    pub inventory_items: u64,
    pub equipment_items: u64,
    pub active_leads: u64,
}

impl UsageCounters {
    /// Read the counter tracked for a limit
    pub fn get(&self, limit: Limit) -> u64 {
        match limit {
            Limit::ActiveJobs => self.active_jobs,
            Limit::InvoicesThisMonth => self.invoices_this_month,
            Limit::TotalCustomers => self.total_customers,
            Limit::TeamMembers => self.team_members,
            Limit::InventoryItems => self.inventory_items,
            Limit::EquipmentItems => self.equipment_items,
            Limit::ActiveLeads => self.active_leads,
        }
    }
}

/// A user-facing notification row, as seen by the cleanup sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub contractor_id: String,
    pub read: bool,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// One observed limit violation, handed to the monitoring collaborator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitViolation {
    pub contractor_id: String,
    pub limit: Limit,
    pub current: u64,
    pub limit_value: u64,
    pub tier: Tier,
    pub timestamp: DateTime<Utc>,
}

/// Read access to contractor accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch an account, `None` if the contractor does not exist
    async fn get_account(
        &self,
        contractor_id: &str,
    ) -> Result<Option<ContractorAccount>, StoreError>;
}

/// Read/write access to usage counters and the billing-period marker
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current counters, `None` if the contractor has no usage row yet
    async fn get_counters(&self, contractor_id: &str) -> Result<Option<UsageCounters>, StoreError>;

    /// Start of the billing period the counters were last reset for
    async fn period_start(&self, contractor_id: &str)
        -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Zero the period-scoped counters and record the new period marker
    ///
    /// Must be a plain last-writer-wins set (never an increment): concurrent
    /// requests may race to perform the same reset and both writes must land
    /// on the same state. Creates the usage row if the contractor has none.
    async fn reset_period(
        &self,
        contractor_id: &str,
        period_start: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Batch maintenance operations on notification rows
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Mark unarchived notifications created before `cutoff` as archived,
    /// returning how many rows changed
    async fn archive_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Hard-delete up to `limit` notifications that are read and created
    /// before `cutoff`, returning how many rows were deleted
    async fn delete_read_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<u64, StoreError>;
}

/// Monitoring collaborator receiving limit-violation observations
///
/// Best-effort: the gate emits violations fire-and-forget and a sink failure
/// never fails the triggering check.
#[async_trait]
pub trait ViolationSink: Send + Sync {
    async fn log_limit_violation(&self, violation: LimitViolation) -> Result<(), StoreError>;
}
