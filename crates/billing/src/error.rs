//! Billing error types

use thiserror::Error;

/// Errors surfaced by the billing engine.
///
/// Domain-level absences (unknown client, unconfigured plan) are reported
/// as `Ok(None)` or degraded rows by the public entry points; these
/// variants exist for the internal paths and for callers that need to
/// distinguish them.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("database error: {0}")]
    Database(String),

    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("no billing plan configured for plan '{plan}' with term '{term}'")]
    PlanUnconfigured { plan: String, term: String },
}

pub type BillingResult<T> = Result<T, BillingError>;

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}
