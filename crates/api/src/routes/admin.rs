//! Administrative routes: grants, catalog and institute management.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use stride_core::{Points, UserId};
use stride_engine::store::{
    CatalogItem, GrantRecord, Institute, NewCatalogItem, NewInstitute,
};

use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub target_id: UserId,
    pub amount: Points,
    pub reason: String,
}

/// `POST /admin/grants`
///
/// The sole issuance path not backed by earned activity; every grant is
/// recorded with actor, target, amount, reason, and timestamp.
pub async fn grant(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(body): Json<GrantRequest>,
) -> Result<(StatusCode, Json<GrantRecord>), ApiError> {
    let record = state
        .engine()
        .grant(identity, body.target_id, body.amount, &body.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `POST /admin/catalog`
pub async fn create_catalog_item(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(body): Json<NewCatalogItem>,
) -> Result<(StatusCode, Json<CatalogItem>), ApiError> {
    let item = state.engine().create_catalog_item(identity, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `POST /admin/institutes`
pub async fn create_institute(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Json(body): Json<NewInstitute>,
) -> Result<(StatusCode, Json<Institute>), ApiError> {
    let institute = state.engine().create_institute(identity, body).await?;
    Ok((StatusCode::CREATED, Json(institute)))
}
