//! Client read endpoints

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use opsledger_shared::types::{Asset, Company, CustomLineItem, EndUser, ManualAsset, ManualUser};

use crate::error::ApiError;
use crate::state::AppState;

const COMPANY_COLUMNS: &str = "account_number, name, helpdesk_id, rmm_site_uid, billing_plan, \
     status, contract_term_length, contract_start_date, support_level, phone_number, \
     client_start_date";

#[derive(Debug, Serialize)]
pub struct ClientDetail {
    pub company: Company,
    pub assets: Vec<Asset>,
    pub manual_assets: Vec<ManualAsset>,
    pub users: Vec<EndUser>,
    pub manual_users: Vec<ManualUser>,
    pub line_items: Vec<CustomLineItem>,
}

pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Company>>, ApiError> {
    let companies = sqlx::query_as::<_, Company>(&format!(
        "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(companies))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<ClientDetail>, ApiError> {
    let company = sqlx::query_as::<_, Company>(&format!(
        "SELECT {COMPANY_COLUMNS} FROM companies WHERE account_number = $1"
    ))
    .bind(&account_number)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("client not found: {account_number}")))?;

    let assets = sqlx::query_as::<_, Asset>(
        "SELECT id, company_account_number, rmm_uid, hostname, friendly_name, device_type, \
         billing_type, status, operating_system, backup_data_bytes, last_seen \
         FROM assets WHERE company_account_number = $1 ORDER BY hostname",
    )
    .bind(&account_number)
    .fetch_all(&state.pool)
    .await?;

    let manual_assets = sqlx::query_as::<_, ManualAsset>(
        "SELECT id, company_account_number, name, billing_type \
         FROM manual_assets WHERE company_account_number = $1 ORDER BY name",
    )
    .bind(&account_number)
    .fetch_all(&state.pool)
    .await?;

    let users = sqlx::query_as::<_, EndUser>(
        "SELECT id, company_account_number, helpdesk_id, full_name, email, status, billing_type \
         FROM end_users WHERE company_account_number = $1 ORDER BY full_name",
    )
    .bind(&account_number)
    .fetch_all(&state.pool)
    .await?;

    let manual_users = sqlx::query_as::<_, ManualUser>(
        "SELECT id, company_account_number, full_name, billing_type \
         FROM manual_users WHERE company_account_number = $1 ORDER BY full_name",
    )
    .bind(&account_number)
    .fetch_all(&state.pool)
    .await?;

    let line_items = sqlx::query_as::<_, CustomLineItem>(
        "SELECT id, company_account_number, name, monthly_fee, one_off_fee, one_off_month, \
         one_off_year, yearly_fee, yearly_bill_month, yearly_bill_day \
         FROM custom_line_items WHERE company_account_number = $1 ORDER BY name",
    )
    .bind(&account_number)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ClientDetail {
        company,
        assets,
        manual_assets,
        users,
        manual_users,
        line_items,
    }))
}
