//! Balance and daily earning routes.

use axum::{Json, extract::State};
use chrono::NaiveDate;
use serde::Deserialize;

use stride_engine::Balance;
use stride_engine::store::DailyEarningRecord;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /points/balance`
pub async fn balance(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Balance>, ApiError> {
    let balance = state.engine().get_balance(identity.user_id).await?;
    Ok(Json(balance))
}

#[derive(Debug, Deserialize)]
pub struct ReportStepsRequest {
    pub date: NaiveDate,
    pub steps: u32,
}

/// `POST /points/steps`
pub async fn report_steps(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(body): Json<ReportStepsRequest>,
) -> Result<Json<DailyEarningRecord>, ApiError> {
    let record = state
        .engine()
        .report_steps(identity.user_id, body.date, body.steps)
        .await?;
    Ok(Json(record))
}

/// `POST /points/validate`
pub async fn validate(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<DailyEarningRecord>, ApiError> {
    let record = state.engine().validate_steps(identity.user_id).await?;
    Ok(Json(record))
}

/// `GET /points/today`
pub async fn today(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Option<DailyEarningRecord>>, ApiError> {
    let record = state.engine().today_earning(identity.user_id).await?;
    Ok(Json(record))
}
