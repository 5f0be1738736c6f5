//! crewkit-gate - subscription gating and inline maintenance for CrewKit
//!
//! Decides per request whether a contractor account may use a feature or has
//! exceeded a usage quota, and performs the periodic bookkeeping (monthly
//! counter resets, daily usage checks, notification cleanup) that keeps those
//! quotas accurate — piggy-backed on ordinary API requests, no scheduler
//! process required.

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod daily;
pub mod error;
pub mod gate;
pub mod gatekeeper;
pub mod memory;
pub mod ops;
pub mod reset;
pub mod resolver;
pub mod stores;

pub use catalog::{Feature, Limit, Tier, TierLimits};
pub use cleanup::{CleanupStats, NotificationCleanupService};
pub use config::GateConfig;
pub use daily::DailyCheckService;
pub use error::{GateError, StoreError};
pub use gate::{FeatureAccessResult, FeatureGate, LimitCheckResult, UsageOverview};
pub use gatekeeper::Gatekeeper;
pub use ops::{BackgroundOps, BackgroundOpsOptions, BackgroundOpsReport, OpsError};
pub use reset::{billing_period_start, MonthlyResetService, ResetOutcome};
pub use resolver::TierResolver;
pub use stores::{
    AccountStore, ContractorAccount, LimitViolation, NotificationRecord, NotificationStore,
    UsageCounters, UsageStore, ViolationSink,
};
