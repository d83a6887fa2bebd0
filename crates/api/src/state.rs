//! Application state

use sqlx::PgPool;

use opsledger_billing::BillingEngine;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub billing: BillingEngine,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let billing = BillingEngine::new(pool.clone());
        Self {
            pool,
            config,
            billing,
        }
    }
}
