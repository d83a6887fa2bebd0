//! Entity classification and unit pricing
//!
//! Every billable entity (synced or manual, asset or user) resolves to one
//! billing category and one unit cost. Per-entity overrides beat the stored
//! category; the `Custom` category prices solely from the override's custom
//! cost and never consults the rate table.

use serde::Serialize;

use opsledger_shared::types::{AssetOverride, UserOverride};
use opsledger_shared::BillingCategory;

use crate::rates::EffectiveRates;

/// Which kind of entity is being classified. Determines the default
/// category and which rate field non-special categories price from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Asset,
    User,
}

impl EntityKind {
    pub fn default_category(self) -> BillingCategory {
        match self {
            EntityKind::Asset => BillingCategory::Workstation,
            EntityKind::User => BillingCategory::Paid,
        }
    }
}

/// Category/custom-cost override for a single entity.
#[derive(Debug, Clone, Default)]
pub struct EntityOverride {
    pub billing_type: Option<String>,
    pub custom_cost: Option<f64>,
}

impl From<&AssetOverride> for EntityOverride {
    fn from(ov: &AssetOverride) -> Self {
        Self {
            billing_type: ov.billing_type.clone(),
            custom_cost: ov.custom_cost,
        }
    }
}

impl From<&UserOverride> for EntityOverride {
    fn from(ov: &UserOverride) -> Self {
        Self {
            billing_type: ov.billing_type.clone(),
            custom_cost: ov.custom_cost,
        }
    }
}

/// Resolve an entity's billing category: override category wins, then the
/// stored category, then the kind default for absent/empty values.
pub fn resolve_category(
    kind: EntityKind,
    stored: Option<&str>,
    entity_override: Option<&EntityOverride>,
) -> BillingCategory {
    if let Some(label) = entity_override
        .and_then(|ov| ov.billing_type.as_deref())
        .filter(|label| !label.trim().is_empty())
    {
        return BillingCategory::from_label(label);
    }
    match stored {
        Some(label) if !label.trim().is_empty() => BillingCategory::from_label(label),
        _ => kind.default_category(),
    }
}

/// Price a resolved category.
pub fn unit_cost(
    kind: EntityKind,
    category: &BillingCategory,
    entity_override: Option<&EntityOverride>,
    rates: &EffectiveRates,
) -> f64 {
    match category {
        BillingCategory::Custom => entity_override
            .and_then(|ov| ov.custom_cost)
            .unwrap_or(0.0),
        BillingCategory::NoCharge => 0.0,
        _ => match kind {
            EntityKind::Asset => rates.amount(&category.rate_field()),
            EntityKind::User => {
                if *category == BillingCategory::Paid {
                    rates.amount("per_user_cost")
                } else {
                    0.0
                }
            }
        },
    }
}

/// Classify and price in one step.
pub fn classify_and_price(
    kind: EntityKind,
    stored: Option<&str>,
    entity_override: Option<&EntityOverride>,
    rates: &EffectiveRates,
) -> (BillingCategory, f64) {
    let category = resolve_category(kind, stored, entity_override);
    let cost = unit_cost(kind, &category, entity_override, rates);
    (category, cost)
}

/// Running per-category unit counts, accumulated during classification and
/// shown as dashboard quantity columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuantityCounts {
    pub workstations: u32,
    pub servers: u32,
    pub vms: u32,
    pub switches: u32,
    pub firewalls: u32,
    pub custom_assets: u32,
    pub no_charge_assets: u32,
    pub other_assets: u32,
    pub paid_users: u32,
    pub free_users: u32,
    pub custom_users: u32,
    pub other_users: u32,
}

impl QuantityCounts {
    pub fn record_asset(&mut self, category: &BillingCategory) {
        match category {
            BillingCategory::Workstation => self.workstations += 1,
            BillingCategory::Server => self.servers += 1,
            BillingCategory::Vm => self.vms += 1,
            BillingCategory::Switch => self.switches += 1,
            BillingCategory::Firewall => self.firewalls += 1,
            BillingCategory::Custom => self.custom_assets += 1,
            BillingCategory::NoCharge => self.no_charge_assets += 1,
            _ => self.other_assets += 1,
        }
    }

    pub fn record_user(&mut self, category: &BillingCategory) {
        match category {
            BillingCategory::Paid => self.paid_users += 1,
            BillingCategory::Free | BillingCategory::NoCharge => self.free_users += 1,
            BillingCategory::Custom => self.custom_users += 1,
            _ => self.other_users += 1,
        }
    }
}
