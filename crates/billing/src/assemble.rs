//! Billing assembly for a single client and period
//!
//! Pure computation over a point-in-time snapshot of a client's records:
//! resolves effective rates, classifies every billable entity, runs both
//! usage meters, selects line items, and reconciles the itemized total.

use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Month, OffsetDateTime};

use opsledger_shared::types::{
    Asset, AssetOverride, Company, CustomLineItem, EndUser, ManualAsset, ManualUser, TicketDetail,
    UserOverride,
};

use crate::classify::{classify_and_price, EntityKind, EntityOverride, QuantityCounts};
use crate::line_items::{select_line_items, AppliedLineItem};
use crate::rates::{resolve_rates, ClientOverride, EffectiveRates, PlanRates};
use crate::usage::{aggregate_tickets, BackupUsage, TicketUsage};

/// Default contract term when a company record carries none.
pub const DEFAULT_TERM: &str = "Month to Month";

/// Everything the assembler needs for one client, loaded in one pass.
/// The engine never writes; each call gets its own snapshot.
#[derive(Debug, Clone)]
pub struct BillingSnapshot {
    pub company: Company,
    pub client_override: Option<ClientOverride>,
    /// The matched `(plan, term)` template; `None` means unconfigured.
    pub plan: Option<PlanRates>,
    /// Plan name after applying an enabled override.
    pub effective_plan: String,
    /// Stored contract term, defaulted to [`DEFAULT_TERM`].
    pub term: String,
    pub assets: Vec<Asset>,
    pub manual_assets: Vec<ManualAsset>,
    pub users: Vec<EndUser>,
    pub manual_users: Vec<ManualUser>,
    pub asset_overrides: HashMap<i64, AssetOverride>,
    pub user_overrides: HashMap<i64, UserOverride>,
    pub line_items: Vec<CustomLineItem>,
    pub tickets: Vec<TicketDetail>,
}

/// One priced entity on the receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BilledEntity {
    pub name: String,
    pub category: String,
    pub unit_cost: f64,
}

/// The itemized receipt. `total` is the sum of the five charge buckets.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub total: f64,
    pub total_asset_charges: f64,
    pub total_user_charges: f64,
    pub ticket_charge: f64,
    pub backup_charge: f64,
    pub total_line_item_charges: f64,
    pub billed_assets: Vec<BilledEntity>,
    pub billed_users: Vec<BilledEntity>,
    pub line_items: Vec<AppliedLineItem>,
    pub tickets: TicketUsage,
    pub backup: BackupUsage,
}

/// Full billing result for one client and period, including the raw
/// entity lists the caller renders alongside the receipt.
#[derive(Debug, Clone, Serialize)]
pub struct BillingDetails {
    pub company: Company,
    pub year: i32,
    pub month: u8,
    pub effective_plan: String,
    pub term: String,
    pub support_level: Option<String>,
    pub contract_end_date: Option<Date>,
    pub contract_expired: bool,
    pub receipt: Receipt,
    pub quantities: QuantityCounts,
    pub effective_rates: EffectiveRates,
    pub assets: Vec<Asset>,
    pub manual_assets: Vec<ManualAsset>,
    pub users: Vec<EndUser>,
    pub manual_users: Vec<ManualUser>,
}

/// Outcome of assembling one client: a full bill, or the plan lookup miss
/// that the dashboard degrades into a labeled zero row.
#[derive(Debug, Clone)]
pub enum BillingOutcome {
    Ready(Box<BillingDetails>),
    PlanUnconfigured { plan: String, term: String },
}

/// Contract length in years for the literal term strings; `None` for
/// month-to-month (or anything unrecognized).
pub fn term_years(term: &str) -> Option<i32> {
    match term {
        "1-Year" => Some(1),
        "2-Year" => Some(2),
        "3-Year" => Some(3),
        _ => None,
    }
}

fn add_years(date: Date, years: i32) -> Date {
    let target_year = date.year() + years;
    match Date::from_calendar_date(target_year, date.month(), date.day()) {
        Ok(shifted) => shifted,
        // Feb 29 start in a non-leap target year clamps to Feb 28
        Err(_) => Date::from_calendar_date(target_year, Month::February, 28).unwrap_or(date),
    }
}

/// Contract end date: start plus the term length, minus one day.
pub fn contract_end(start: Date, term: &str) -> Option<Date> {
    let years = term_years(term)?;
    let anniversary = add_years(start, years);
    Some(anniversary.previous_day().unwrap_or(anniversary))
}

/// Assemble the bill for (year, month). `now` anchors contract expiry.
pub fn assemble(snapshot: BillingSnapshot, year: i32, month: u8, now: OffsetDateTime) -> BillingOutcome {
    let BillingSnapshot {
        company,
        client_override,
        plan,
        effective_plan,
        term,
        assets,
        manual_assets,
        users,
        manual_users,
        asset_overrides,
        user_overrides,
        line_items,
        tickets,
    } = snapshot;

    let Some(plan) = plan else {
        return BillingOutcome::PlanUnconfigured {
            plan: effective_plan,
            term,
        };
    };

    let rates = resolve_rates(&plan, client_override.as_ref());

    let mut quantities = QuantityCounts::default();
    let mut backup = BackupUsage::default();
    let mut billed_assets = Vec::with_capacity(assets.len() + manual_assets.len());
    let mut total_asset_charges = 0.0;

    for asset in &assets {
        let entity_override = asset_overrides.get(&asset.id).map(EntityOverride::from);
        let (category, cost) = classify_and_price(
            EntityKind::Asset,
            asset.billing_type.as_deref(),
            entity_override.as_ref(),
            &rates,
        );
        quantities.record_asset(&category);
        backup.record(&category, asset.backup_data_bytes);
        total_asset_charges += cost;
        billed_assets.push(BilledEntity {
            name: asset.display_name().to_string(),
            category: category.as_str().to_string(),
            unit_cost: cost,
        });
    }

    for asset in &manual_assets {
        let (category, cost) =
            classify_and_price(EntityKind::Asset, asset.billing_type.as_deref(), None, &rates);
        quantities.record_asset(&category);
        total_asset_charges += cost;
        billed_assets.push(BilledEntity {
            name: asset.name.clone(),
            category: category.as_str().to_string(),
            unit_cost: cost,
        });
    }

    let mut billed_users = Vec::with_capacity(users.len() + manual_users.len());
    let mut total_user_charges = 0.0;

    for user in users.iter().filter(|user| user.is_active()) {
        let entity_override = user_overrides.get(&user.id).map(EntityOverride::from);
        let (category, cost) = classify_and_price(
            EntityKind::User,
            user.billing_type.as_deref(),
            entity_override.as_ref(),
            &rates,
        );
        quantities.record_user(&category);
        total_user_charges += cost;
        billed_users.push(BilledEntity {
            name: user.full_name.clone(),
            category: category.as_str().to_string(),
            unit_cost: cost,
        });
    }

    for user in &manual_users {
        let (category, cost) =
            classify_and_price(EntityKind::User, user.billing_type.as_deref(), None, &rates);
        quantities.record_user(&category);
        total_user_charges += cost;
        billed_users.push(BilledEntity {
            name: user.full_name.clone(),
            category: category.as_str().to_string(),
            unit_cost: cost,
        });
    }

    let backup = backup.finalize(&rates);

    let prepaid_monthly = client_override
        .as_ref()
        .map(|ov| ov.enabled_amount("prepaid_hours_monthly"))
        .unwrap_or(0.0);
    let prepaid_yearly = client_override
        .as_ref()
        .map(|ov| ov.enabled_amount("prepaid_hours_yearly"))
        .unwrap_or(0.0);
    let ticket_usage =
        aggregate_tickets(&tickets, year, month, prepaid_monthly, prepaid_yearly, &rates);

    let (applied_items, total_line_item_charges) = select_line_items(&line_items, year, month);

    let total = total_asset_charges
        + total_user_charges
        + ticket_usage.charge
        + backup.charge
        + total_line_item_charges;

    let contract_end_date = company
        .contract_start_date
        .map(|start| start.date())
        .and_then(|start| contract_end(start, &term));
    let contract_expired = contract_end_date
        .map(|end| end < now.date())
        .unwrap_or(false);

    let support_level = rates
        .label("support_level")
        .map(str::to_string)
        .or_else(|| company.support_level.clone());

    BillingOutcome::Ready(Box::new(BillingDetails {
        company,
        year,
        month,
        effective_plan,
        term,
        support_level,
        contract_end_date,
        contract_expired,
        receipt: Receipt {
            total,
            total_asset_charges,
            total_user_charges,
            ticket_charge: ticket_usage.charge,
            backup_charge: backup.charge,
            total_line_item_charges,
            billed_assets,
            billed_users,
            line_items: applied_items,
            tickets: ticket_usage,
            backup,
        },
        quantities,
        effective_rates: rates,
        assets,
        manual_assets,
        users,
        manual_users,
    }))
}
