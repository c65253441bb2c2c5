//! HTTP route handlers.
//!
//! All routes are JSON, all mutating routes sit behind bearer-token
//! identity, and admin routes additionally require the administrative role.

pub mod admin;
pub mod catalog;
pub mod checkout;
pub mod donations;
pub mod events;
pub mod orders;
pub mod points;
pub mod transfers;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/points/balance", get(points::balance))
        .route("/points/steps", post(points::report_steps))
        .route("/points/validate", post(points::validate))
        .route("/points/today", get(points::today))
        .route("/catalog", get(catalog::list))
        .route("/checkout", post(checkout::checkout))
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/transfers", post(transfers::propose).get(transfers::list))
        .route("/transfers/{id}/respond", post(transfers::respond))
        .route("/donations", post(donations::donate))
        .route("/institutes/{id}", get(donations::institute))
        .route("/admin/grants", post(admin::grant))
        .route("/admin/catalog", post(admin::create_catalog_item))
        .route("/admin/institutes", post(admin::create_institute))
        .route("/events", get(events::stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}
