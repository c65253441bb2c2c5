//! Donation and institute routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use stride_core::{InstituteId, Points};
use stride_engine::DonationOutcome;
use stride_engine::store::Institute;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DonateRequest {
    pub institute_id: InstituteId,
    pub amount: Points,
}

/// `POST /donations`
pub async fn donate(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(body): Json<DonateRequest>,
) -> Result<(StatusCode, Json<DonationOutcome>), ApiError> {
    let outcome = state
        .engine()
        .donate(identity.user_id, body.institute_id, body.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `GET /institutes/{id}`
pub async fn institute(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<Institute>, ApiError> {
    let institute = state.engine().institute(InstituteId::new(id)).await?;
    Ok(Json(institute))
}
