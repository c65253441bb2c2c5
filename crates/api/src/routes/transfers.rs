//! Two-phase transfer routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use stride_core::{Points, TransferId, UserId};
use stride_engine::store::PointTransfer;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub receiver_id: UserId,
    pub amount: Points,
}

/// `POST /transfers`
pub async fn propose(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(body): Json<ProposeRequest>,
) -> Result<(StatusCode, Json<PointTransfer>), ApiError> {
    let transfer = state
        .engine()
        .propose_transfer(identity.user_id, body.receiver_id, body.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// `GET /transfers`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<PointTransfer>>, ApiError> {
    let transfers = state.engine().transfers(identity.user_id).await?;
    Ok(Json(transfers))
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

/// `POST /transfers/{id}/respond`
///
/// Only the receiver may respond. Acceptance re-checks the sender's balance
/// at this moment; a failed re-check leaves the transfer pending.
pub async fn respond(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i32>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<PointTransfer>, ApiError> {
    let transfer = state
        .engine()
        .respond_transfer(identity.user_id, TransferId::new(id), body.accept)
        .await?;
    Ok(Json(transfer))
}
