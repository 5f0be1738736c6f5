//! Static subscription tier catalog
//!
//! Tiers, their feature capabilities, and their numeric usage limits are
//! compiled into the process and never change at runtime. Limits use
//! `Option<u64>`: `None` means unlimited, `Some(0)` means the counter's
//! feature is not available on the tier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Subscription tier for a contractor account
///
/// Ordering follows plan value: `Starter < Pro < Enterprise`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Entry plan for solo contractors
    #[default]
    Starter,
    /// Growing crews
    Pro,
    /// Unlimited usage, full feature set
    Enterprise,
}

/// Gated product capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Scheduling,
    Invoicing,
    Estimates,
    LeadTracking,
    RecurringInvoices,
    CustomerPortal,
    AdvancedReports,
    BulkInvoicing,
    ApiAccess,
    CustomBranding,
    PrioritySupport,
}

/// Tracked usage counters, one per numeric tier limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    ActiveJobs,
    InvoicesThisMonth,
    TotalCustomers,
    TeamMembers,
    InventoryItems,
    EquipmentItems,
    ActiveLeads,
}

/// Numeric ceilings for one tier
///
/// `None` = unlimited, `Some(0)` = not available on this tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub active_jobs: Option<u64>,
    pub invoices_this_month: Option<u64>,
    pub total_customers: Option<u64>,
    pub team_members: Option<u64>,
    pub inventory_items: Option<u64>,
    pub equipment_items: Option<u64>,
    pub active_leads: Option<u64>,
}

impl TierLimits {
    /// Look up a single limit by name
    pub fn get(&self, limit: Limit) -> Option<u64> {
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

impl Tier {
    /// All tiers, cheapest first
    pub const ALL: [Tier; 3] = [Tier::Starter, Tier::Pro, Tier::Enterprise];

    /// Normalize a stored tier string
    ///
    /// Accounts created before the plan rename carry legacy names; anything
    /// unrecognized falls back to Starter rather than failing, so a bad
    /// string can only ever under-grant.
    pub fn from_raw(raw: &str) -> Tier {
        match raw.trim().to_ascii_lowercase().as_str() {
            "starter" | "basic" | "free" | "trial" => Tier::Starter,
            "pro" | "premium" | "professional" | "plus" => Tier::Pro,
            "enterprise" | "business" | "ultimate" => Tier::Enterprise,
            _ => Tier::Starter,
        }
    }

    /// Human-readable plan name
    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Starter => "Starter",
            Tier::Pro => "Pro",
            Tier::Enterprise => "Enterprise",
        }
    }

    /// Monthly price in USD
    pub fn monthly_price(&self) -> f64 {
        match self {
            Tier::Starter => 29.0,
            Tier::Pro => 79.0,
            Tier::Enterprise => 199.0,
        }
    }

    /// Numeric usage ceilings for this tier
    pub fn limits(&self) -> TierLimits {
        match self {
            Tier::Starter => TierLimits {
                active_jobs: Some(15),
                invoices_this_month: Some(25),
                total_customers: Some(100),
                team_members: Some(3),
                inventory_items: Some(50),
                equipment_items: Some(20),
                active_leads: Some(25),
            },
            Tier::Pro => TierLimits {
                active_jobs: Some(75),
                invoices_this_month: Some(200),
                total_customers: Some(1000),
                team_members: Some(15),
                inventory_items: Some(500),
                equipment_items: Some(150),
                active_leads: Some(200),
            },
            Tier::Enterprise => TierLimits {
                active_jobs: None,
                invoices_this_month: None,
                total_customers: None,
                team_members: None,
                inventory_items: None,
                equipment_items: None,
                active_leads: None,
            },
        }
    }

    /// Whether this tier includes a feature
    pub fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::Scheduling | Feature::Invoicing | Feature::Estimates | Feature::LeadTracking => {
                true
            }
            Feature::RecurringInvoices
            | Feature::CustomerPortal
            | Feature::AdvancedReports
            | Feature::BulkInvoicing => *self >= Tier::Pro,
            Feature::ApiAccess | Feature::CustomBranding | Feature::PrioritySupport => {
                *self == Tier::Enterprise
            }
        }
    }

    /// Lowest tier that grants a feature, for upgrade messaging
    pub fn minimum_for(feature: Feature) -> Tier {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.has_feature(feature))
            .unwrap_or(Tier::Enterprise)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl Feature {
    /// Stable snake_case identifier, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Scheduling => "scheduling",
            Feature::Invoicing => "invoicing",
            Feature::Estimates => "estimates",
            Feature::LeadTracking => "lead_tracking",
            Feature::RecurringInvoices => "recurring_invoices",
            Feature::CustomerPortal => "customer_portal",
            Feature::AdvancedReports => "advanced_reports",
            Feature::BulkInvoicing => "bulk_invoicing",
            Feature::ApiAccess => "api_access",
            Feature::CustomBranding => "custom_branding",
            Feature::PrioritySupport => "priority_support",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Limit {
    /// All tracked limits, in dashboard display order
    pub const ALL: [Limit; 7] = [
        Limit::ActiveJobs,
        Limit::InvoicesThisMonth,
        Limit::TotalCustomers,
        Limit::TeamMembers,
        Limit::InventoryItems,
        Limit::EquipmentItems,
        Limit::ActiveLeads,
    ];

    /// Stable snake_case identifier, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Limit::ActiveJobs => "active_jobs",
            Limit::InvoicesThisMonth => "invoices_this_month",
            Limit::TotalCustomers => "total_customers",
            Limit::TeamMembers => "team_members",
            Limit::InventoryItems => "inventory_items",
            Limit::EquipmentItems => "equipment_items",
            Limit::ActiveLeads => "active_leads",
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
