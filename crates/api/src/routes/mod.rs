//! Route composition

pub mod billing;
pub mod clients;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/billing/dashboard", get(billing::dashboard))
        .route("/api/clients", get(clients::list_clients))
        .route("/api/clients/{account_number}", get(clients::get_client))
        .route(
            "/api/clients/{account_number}/billing",
            get(billing::client_billing),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
