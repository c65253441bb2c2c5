//! Catalog read routes.

use axum::{Json, extract::State};

use stride_engine::store::CatalogItem;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /catalog`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<CatalogItem>>, ApiError> {
    let items = state.engine().catalog().await?;
    Ok(Json(items))
}
