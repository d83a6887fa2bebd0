//! Snapshot loading
//!
//! Read-only queries that materialize one client's records for the
//! assembler. Plan and override rows are fetched with `SELECT *` and
//! decoded by column name so dynamically added feature columns are picked
//! up without code changes.

use std::collections::HashMap;

use sqlx::PgPool;

use opsledger_shared::types::{
    Asset, AssetOverride, Company, CustomLineItem, EndUser, ManualAsset, ManualUser, TicketDetail,
    UserOverride,
};

use crate::assemble::{BillingSnapshot, DEFAULT_TERM};
use crate::error::BillingResult;
use crate::rates::{ClientOverride, PlanRates};

const COMPANY_COLUMNS: &str = "account_number, name, helpdesk_id, rmm_site_uid, billing_plan, \
     status, contract_term_length, contract_start_date, support_level, phone_number, \
     client_start_date";

pub(crate) async fn fetch_company(
    pool: &PgPool,
    account_number: &str,
) -> BillingResult<Option<Company>> {
    let company = sqlx::query_as::<_, Company>(&format!(
        "SELECT {COMPANY_COLUMNS} FROM companies WHERE account_number = $1"
    ))
    .bind(account_number)
    .fetch_optional(pool)
    .await?;
    Ok(company)
}

pub(crate) async fn fetch_companies(pool: &PgPool) -> BillingResult<Vec<Company>> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

async fn fetch_client_override(
    pool: &PgPool,
    account_number: &str,
) -> BillingResult<Option<ClientOverride>> {
    let row = sqlx::query("SELECT * FROM client_billing_overrides WHERE company_account_number = $1")
        .bind(account_number)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(ClientOverride::from_pg_row))
}

async fn fetch_plan(pool: &PgPool, plan: &str, term: &str) -> BillingResult<Option<PlanRates>> {
    let row = sqlx::query("SELECT * FROM billing_plans WHERE billing_plan = $1 AND term_length = $2")
        .bind(plan)
        .bind(term)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(PlanRates::from_pg_row))
}

/// Load everything the assembler needs for one client. Tickets are scoped
/// to the requested calendar year, matching the usage meter's window.
pub(crate) async fn load_snapshot(
    pool: &PgPool,
    company: Company,
    year: i32,
) -> BillingResult<BillingSnapshot> {
    let account = company.account_number.clone();

    let client_override = fetch_client_override(pool, &account).await?;

    let effective_plan = client_override
        .as_ref()
        .and_then(|ov| ov.enabled_label("billing_plan"))
        .map(str::to_string)
        .or_else(|| company.billing_plan.clone())
        .unwrap_or_default();
    let term = company
        .contract_term_length
        .clone()
        .filter(|term| !term.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TERM.to_string());

    let plan = if effective_plan.is_empty() {
        None
    } else {
        fetch_plan(pool, &effective_plan, &term).await?
    };

    let assets = sqlx::query_as::<_, Asset>(
        "SELECT id, company_account_number, rmm_uid, hostname, friendly_name, device_type, \
         billing_type, status, operating_system, backup_data_bytes, last_seen \
         FROM assets WHERE company_account_number = $1 ORDER BY hostname",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?;

    let manual_assets = sqlx::query_as::<_, ManualAsset>(
        "SELECT id, company_account_number, name, billing_type \
         FROM manual_assets WHERE company_account_number = $1 ORDER BY name",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?;

    let users = sqlx::query_as::<_, EndUser>(
        "SELECT id, company_account_number, helpdesk_id, full_name, email, status, billing_type \
         FROM end_users WHERE company_account_number = $1 ORDER BY full_name",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?;

    let manual_users = sqlx::query_as::<_, ManualUser>(
        "SELECT id, company_account_number, full_name, billing_type \
         FROM manual_users WHERE company_account_number = $1 ORDER BY full_name",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?;

    let asset_overrides: HashMap<i64, AssetOverride> = sqlx::query_as::<_, AssetOverride>(
        "SELECT ao.id, ao.asset_id, ao.billing_type, ao.custom_cost \
         FROM asset_billing_overrides ao \
         JOIN assets a ON a.id = ao.asset_id \
         WHERE a.company_account_number = $1",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|ov| (ov.asset_id, ov))
    .collect();

    let user_overrides: HashMap<i64, UserOverride> = sqlx::query_as::<_, UserOverride>(
        "SELECT uo.id, uo.user_id, uo.billing_type, uo.custom_cost \
         FROM user_billing_overrides uo \
         JOIN end_users u ON u.id = uo.user_id \
         WHERE u.company_account_number = $1",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|ov| (ov.user_id, ov))
    .collect();

    let line_items = sqlx::query_as::<_, CustomLineItem>(
        "SELECT id, company_account_number, name, monthly_fee, one_off_fee, one_off_month, \
         one_off_year, yearly_fee, yearly_bill_month, yearly_bill_day \
         FROM custom_line_items WHERE company_account_number = $1 ORDER BY name",
    )
    .bind(&account)
    .fetch_all(pool)
    .await?;

    let tickets = sqlx::query_as::<_, TicketDetail>(
        "SELECT ticket_id, company_account_number, subject, last_updated_at, total_hours_spent \
         FROM ticket_details \
         WHERE company_account_number = $1 \
           AND EXTRACT(YEAR FROM last_updated_at)::INT = $2",
    )
    .bind(&account)
    .bind(year)
    .fetch_all(pool)
    .await?;

    Ok(BillingSnapshot {
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
    })
}
