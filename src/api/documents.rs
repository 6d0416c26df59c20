//! Document index endpoints

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::error;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::retrieval::RetrievedContext;

#[derive(Debug, Deserialize)]
pub struct DocumentUpload {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

pub async fn add(
    State(state): State<AppState>,
    Json(upload): Json<DocumentUpload>,
) -> ApiResult<Json<Value>> {
    let document_id = state
        .documents
        .add_document(&upload.content, upload.metadata)
        .await
        .map_err(|e| {
            error!("Error adding document: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({
        "status": "success",
        "document_id": document_id,
    })))
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<RetrievedContext> {
    Json(
        state
            .documents
            .retrieve_context(&request.query, request.top_k)
            .await,
    )
}

pub async fn count(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "count": state.documents.document_count().await,
    }))
}

pub async fn clear(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.documents.clear().await.map_err(|e| {
        error!("Error clearing documents: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(json!({ "status": "success" })))
}
