// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! OpsLedger Billing Engine
//!
//! Computes monthly invoices for managed-services clients from plan
//! templates, per-client and per-entity overrides, metered usage, and
//! ad hoc line items.
//!
//! ## Features
//!
//! - **Rate Resolution**: merge a plan template with enabled client
//!   overrides into one effective rate table (dynamic feature columns
//!   included)
//! - **Entity Classification**: resolve every asset and user to a billing
//!   category and unit cost
//! - **Usage Metering**: backup-storage allowances/overage and
//!   support-hour consumption against prepaid allotments
//! - **Line Items**: recurring, one-off, and yearly ad hoc charges
//! - **Assembly**: one reconciled, itemized receipt per client and period
//! - **Dashboard**: a summary row per client, degrading misconfigured
//!   clients instead of failing the list
//!
//! The engine is strictly read-only over the store: every call works on a
//! freshly loaded snapshot and nothing here writes or locks.

pub mod assemble;
pub mod classify;
pub mod dashboard;
pub mod error;
pub mod line_items;
pub mod rates;
pub mod store;
pub mod usage;

#[cfg(test)]
mod edge_case_tests;

// Assembly
pub use assemble::{
    assemble, contract_end, term_years, BilledEntity, BillingDetails, BillingOutcome,
    BillingSnapshot, Receipt, DEFAULT_TERM,
};

// Classification
pub use classify::{
    classify_and_price, resolve_category, unit_cost, EntityKind, EntityOverride, QuantityCounts,
};

// Dashboard
pub use dashboard::{summary_row, ClientSummaryRow, UNCONFIGURED_PLAN_LABEL};

// Error
pub use error::{BillingError, BillingResult};

// Line items
pub use line_items::{applies_to, select_line_items, AppliedLineItem, LineItemKind};

// Rates
pub use rates::{resolve_rates, ClientOverride, EffectiveRates, PlanRates, RateValue};

// Usage
pub use usage::{aggregate_tickets, BackupUsage, TicketUsage, BYTES_PER_TB};

use sqlx::PgPool;
use time::OffsetDateTime;

/// Billing engine facade over the data store.
///
/// Both entry points are read-only and safe to call concurrently; each
/// call fetches its own snapshot.
#[derive(Clone)]
pub struct BillingEngine {
    pool: PgPool,
}

impl BillingEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Full billing details for one client and period.
    ///
    /// `Ok(None)` covers both absence conditions (unknown account and
    /// unconfigured plan); callers map either to a 404.
    pub async fn get_billing_data_for_client(
        &self,
        account_number: &str,
        year: i32,
        month: u8,
    ) -> BillingResult<Option<BillingDetails>> {
        let Some(company) = store::fetch_company(&self.pool, account_number).await? else {
            return Ok(None);
        };
        let snapshot = store::load_snapshot(&self.pool, company, year).await?;
        match assemble(snapshot, year, month, OffsetDateTime::now_utc()) {
            BillingOutcome::Ready(details) => Ok(Some(*details)),
            BillingOutcome::PlanUnconfigured { plan, term } => {
                tracing::warn!(
                    account_number = account_number,
                    plan = %plan,
                    term = %term,
                    "No billing plan template matches this client"
                );
                Ok(None)
            }
        }
    }

    /// One summary row per known client for the current UTC period.
    ///
    /// A client whose plan is unconfigured, or whose snapshot fails to
    /// load, degrades to a labeled zero row; the rest of the list is
    /// unaffected.
    pub async fn get_billing_dashboard_data(&self) -> BillingResult<Vec<ClientSummaryRow>> {
        let now = OffsetDateTime::now_utc();
        let year = now.year();
        let month = u8::from(now.month());

        let companies = store::fetch_companies(&self.pool).await?;
        let mut rows = Vec::with_capacity(companies.len());

        for company in companies {
            let account = company.account_number.clone();
            let outcome = match store::load_snapshot(&self.pool, company.clone(), year).await {
                Ok(snapshot) => assemble(snapshot, year, month, now),
                Err(err) => {
                    tracing::error!(
                        account_number = %account,
                        error = %err,
                        "Failed to load billing snapshot; degrading dashboard row"
                    );
                    rows.push(dashboard::degraded_row(&company, now));
                    continue;
                }
            };
            if let BillingOutcome::PlanUnconfigured { ref plan, ref term } = outcome {
                tracing::warn!(
                    account_number = %account,
                    plan = %plan,
                    term = %term,
                    "No billing plan template matches this client; degrading dashboard row"
                );
            }
            rows.push(summary_row(&company, &outcome, now));
        }

        Ok(rows)
    }
}
