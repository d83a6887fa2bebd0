//! Domain records and the billing-category enumeration.
//!
//! Synced records are upserted by the worker keyed on their stable external
//! ids (`rmm_uid`, `helpdesk_id`, `ticket_id`); manual records are entered
//! by operators. The billing engine only ever reads them.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Billing category assigned to an asset or user.
///
/// Deployments can introduce further labels beyond the built-in set; those
/// round-trip through `Other` and price via the generic
/// `per_<label>_cost` rate lookup (which coerces to zero when the plan has
/// no such column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingCategory {
    Workstation,
    Server,
    Vm,
    Switch,
    Firewall,
    Custom,
    NoCharge,
    Paid,
    Free,
    Other(String),
}

impl BillingCategory {
    /// Parse a stored category label. Never fails; unrecognized labels are
    /// preserved as `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Workstation" => BillingCategory::Workstation,
            "Server" => BillingCategory::Server,
            "VM" => BillingCategory::Vm,
            "Switch" => BillingCategory::Switch,
            "Firewall" => BillingCategory::Firewall,
            "Custom" => BillingCategory::Custom,
            "No Charge" => BillingCategory::NoCharge,
            "Paid" => BillingCategory::Paid,
            "Free" => BillingCategory::Free,
            other => BillingCategory::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BillingCategory::Workstation => "Workstation",
            BillingCategory::Server => "Server",
            BillingCategory::Vm => "VM",
            BillingCategory::Switch => "Switch",
            BillingCategory::Firewall => "Firewall",
            BillingCategory::Custom => "Custom",
            BillingCategory::NoCharge => "No Charge",
            BillingCategory::Paid => "Paid",
            BillingCategory::Free => "Free",
            BillingCategory::Other(label) => label,
        }
    }

    /// Rate-table field this category prices from, e.g. `per_server_cost`.
    pub fn rate_field(&self) -> String {
        format!("per_{}_cost", self.as_str().to_lowercase())
    }

    /// Counts toward backup base fees and the included-storage allowance.
    pub fn is_backup_eligible(&self) -> bool {
        matches!(
            self,
            BillingCategory::Workstation | BillingCategory::Server | BillingCategory::Vm
        )
    }
}

impl std::fmt::Display for BillingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A client company. Primary key is the externally assigned account number.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub account_number: String,
    pub name: String,
    pub helpdesk_id: Option<i64>,
    pub rmm_site_uid: Option<String>,
    pub billing_plan: Option<String>,
    pub status: Option<String>,
    pub contract_term_length: Option<String>,
    pub contract_start_date: Option<OffsetDateTime>,
    pub support_level: Option<String>,
    pub phone_number: Option<String>,
    pub client_start_date: Option<OffsetDateTime>,
}

/// An RMM-synced device.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Asset {
    pub id: i64,
    pub company_account_number: String,
    pub rmm_uid: String,
    pub hostname: String,
    pub friendly_name: Option<String>,
    pub device_type: Option<String>,
    pub billing_type: Option<String>,
    pub status: Option<String>,
    pub operating_system: Option<String>,
    pub backup_data_bytes: f64,
    pub last_seen: Option<OffsetDateTime>,
}

impl Asset {
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.hostname)
    }
}

/// A hand-entered device. Participates in billing like a synced asset but
/// never carries backup data.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ManualAsset {
    pub id: i64,
    pub company_account_number: String,
    pub name: String,
    pub billing_type: Option<String>,
}

/// A helpdesk-synced end user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EndUser {
    pub id: i64,
    pub company_account_number: String,
    pub helpdesk_id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub status: Option<String>,
    pub billing_type: Option<String>,
}

impl EndUser {
    pub fn is_active(&self) -> bool {
        self.status.as_deref().unwrap_or("Active") == "Active"
    }
}

/// A hand-entered user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ManualUser {
    pub id: i64,
    pub company_account_number: String,
    pub full_name: String,
    pub billing_type: Option<String>,
}

/// Per-asset billing override: category and/or a custom unit cost.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssetOverride {
    pub id: i64,
    pub asset_id: i64,
    pub billing_type: Option<String>,
    pub custom_cost: Option<f64>,
}

/// Per-user billing override.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserOverride {
    pub id: i64,
    pub user_id: i64,
    pub billing_type: Option<String>,
    pub custom_cost: Option<f64>,
}

/// An ad hoc charge attached to a company. Exactly one recurrence mode is
/// meaningful per item: `monthly_fee`, the one-off triple, or the yearly
/// pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomLineItem {
    pub id: i64,
    pub company_account_number: String,
    pub name: String,
    pub monthly_fee: Option<f64>,
    pub one_off_fee: Option<f64>,
    pub one_off_month: Option<i32>,
    pub one_off_year: Option<i32>,
    pub yearly_fee: Option<f64>,
    pub yearly_bill_month: Option<i32>,
    pub yearly_bill_day: Option<i32>,
}

/// A closed support ticket with its billed hours.
///
/// `last_updated_at` doubles as the closure timestamp and the billing-month
/// timestamp. `total_hours_spent` is computed by the sync job from time
/// entries, floored at 0.25 when none exist.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketDetail {
    pub ticket_id: i64,
    pub company_account_number: Option<String>,
    pub subject: Option<String>,
    pub last_updated_at: OffsetDateTime,
    pub total_hours_spent: f64,
}
