//! Catalog cache and fetch report handlers

use crate::api::state::AppState;
use crate::catalog::FetchReport;
use crate::error::Result;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

/// POST /catalog/load - Refresh the cached product identifiers
pub async fn load_catalog(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let total = state.service.load_catalog().await?;
    Ok(Json(json!({
        "status": "success",
        "total": total
    })))
}

/// GET /catalog/ids - Cached product identifiers
pub async fn list_ids(State(state): State<AppState>) -> impl IntoResponse {
    let ids = state.service.cached_ids().await;
    Json(json!({
        "total": ids.len(),
        "ids": ids
    }))
}

/// GET /product - Bounded concurrent fetch of every cached product
pub async fn fetch_products(State(state): State<AppState>) -> Result<Json<FetchReport>> {
    let cancel = state.service.shutdown_token().child_token();
    let report = state.service.fetch_all(&cancel).await?;
    Ok(Json(report))
}

/// GET /products - Sequential fetch, stopping at the first failure
pub async fn fetch_products_sequential(
    State(state): State<AppState>,
) -> Result<Json<FetchReport>> {
    let cancel = state.service.shutdown_token().child_token();
    let report = state.service.fetch_sequential(&cancel).await?;
    Ok(Json(report))
}
