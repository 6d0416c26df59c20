//! Read-only graph inspection endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::error::{ApiError, ApiResult};
use super::AppState;

/// Default page size of the list endpoints.
pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn logged(context: &str, err: crate::Error) -> ApiError {
    error!("Error {}: {}", context, err);
    err.into()
}

pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    info!("Fetching graph summary...");
    let summary = state
        .graph
        .summary()
        .await
        .map_err(|e| logged("getting graph summary", e))?;

    Ok(Json(json!({
        "status": "success",
        "summary": summary,
    })))
}

pub async fn servers(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    info!("Fetching servers (limit: {})...", params.limit);
    let servers = state
        .graph
        .servers(params.limit)
        .await
        .map_err(|e| logged("getting servers", e))?;

    Ok(Json(json!({
        "status": "success",
        "count": servers.len(),
        "servers": servers,
    })))
}

pub async fn applications(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    info!("Fetching applications (limit: {})...", params.limit);
    let applications = state
        .graph
        .applications(params.limit)
        .await
        .map_err(|e| logged("getting applications", e))?;

    Ok(Json(json!({
        "status": "success",
        "count": applications.len(),
        "applications": applications,
    })))
}

pub async fn server_details(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> ApiResult<Json<Value>> {
    info!("Fetching details for server: {}...", server_id);
    let details = state
        .graph
        .server_details(&server_id)
        .await
        .map_err(|e| logged("getting server details", e))?
        .ok_or_else(|| ApiError::NotFound(format!("Server {} not found", server_id)))?;

    Ok(Json(json!({
        "status": "success",
        "server": details,
    })))
}
