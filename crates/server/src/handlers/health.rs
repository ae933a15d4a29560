//! Liveness endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use lyrebird_storage::StorageError;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health - Health check endpoint.
///
/// Fails when the cache root cannot be created, since no request could be served.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    tokio::fs::create_dir_all(state.store.cache().root())
        .await
        .map_err(StorageError::from)?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
