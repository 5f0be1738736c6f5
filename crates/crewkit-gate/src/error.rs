//! Error types for crewkit-gate
//!
//! Gating decisions fail closed: read APIs surface every failure to the
//! caller. The background-ops orchestrator is the one place errors are
//! downgraded to report entries instead (see `ops`).

use thiserror::Error;

use crate::catalog::{Feature, Limit, Tier};

/// Core error type for gating operations
#[derive(Error, Debug)]
pub enum GateError {
    /// The contractor does not exist in the account store.
    ///
    /// Always propagated — an unknown contractor is never defaulted to the
    /// Starter tier.
    #[error("contractor not found: {contractor_id}")]
    ContractorNotFound { contractor_id: String },

    /// A collaborating store failed transiently.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Typed denial for a feature the contractor's tier does not include.
    ///
    /// Produced by [`crate::gate::FeatureAccessResult::require`] when a caller
    /// wants to turn a denied check into a hard failure.
    #[error("{} requires the {} plan or higher", .feature, .required.display_name())]
    FeatureLocked { feature: Feature, required: Tier },

    /// Typed denial for an exhausted usage limit.
    ///
    /// Produced by [`crate::gate::LimitCheckResult::require`].
    #[error("{limit} limit reached ({current}/{max})")]
    LimitExceeded { limit: Limit, current: u64, max: u64 },

    /// A notification sweep is already in flight in this process.
    #[error("notification cleanup is already running")]
    CleanupAlreadyRunning,
}

/// Transient failure reported by a collaborating store
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

impl GateError {
    /// Convenience constructor keeping call sites short.
    pub fn not_found(contractor_id: impl Into<String>) -> Self {
        Self::ContractorNotFound {
            contractor_id: contractor_id.into(),
        }
    }
}
