//! Billing endpoints
//!
//! Thin wrappers over the billing engine; both absence conditions (unknown
//! account, unconfigured plan) map to 404.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use time::OffsetDateTime;

use opsledger_billing::{BillingDetails, ClientSummaryRow};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
}

pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClientSummaryRow>>, ApiError> {
    let rows = state.billing.get_billing_dashboard_data().await?;
    Ok(Json(rows))
}

pub async fn client_billing(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<BillingDetails>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let year = period.year.unwrap_or_else(|| now.year());
    let month = period.month.unwrap_or_else(|| u8::from(now.month()));
    if !(1..=12).contains(&month) {
        return Err(ApiError::BadRequest(format!("invalid month: {month}")));
    }

    let details = state
        .billing
        .get_billing_data_for_client(&account_number, year, month)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "client not found or billing plan unconfigured: {account_number}"
            ))
        })?;
    Ok(Json(details))
}
