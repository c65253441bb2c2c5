//! Order read and lifecycle routes.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use stride_core::{OrderId, OrderStatus};
use stride_engine::store::{Order, OrderWithLines};

use crate::auth::{CurrentUser, RequireAdmin};
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /orders`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.engine().orders(identity.user_id).await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<OrderWithLines>, ApiError> {
    let order = state.engine().order(identity, OrderId::new(id)).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// `POST /orders/{id}/status` (admin)
///
/// Cancellation restores neither points nor stock.
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Path(id): Path<i32>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .engine()
        .update_order_status(identity, OrderId::new(id), body.status)
        .await?;
    Ok(Json(order))
}
