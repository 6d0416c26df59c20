//! Chat and conversation endpoints

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::graph::{natural_language_query, GraphQueryResult};
use crate::retrieval::RetrievedContext;

/// Graph rows quoted into the prompt.
const CONTEXT_ROWS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default = "default_true")]
    pub use_rag: bool,
    #[serde(default)]
    pub use_documents: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Value>>,
}

/// Prompt block for a graph answer. Empty when the query found nothing.
pub fn graph_context(result: &GraphQueryResult) -> String {
    if result.results.is_empty() {
        return String::new();
    }

    let mut context = format!(
        "Graph Query Results ({}):\n{}\n\n",
        result.intent.name(),
        result.summary
    );
    for (idx, row) in result.results.iter().take(CONTEXT_ROWS).enumerate() {
        context.push_str(&format!("{}. {}\n", idx + 1, row));
    }
    context
}

fn document_sources(retrieved: &RetrievedContext) -> Vec<Value> {
    retrieved
        .sources
        .iter()
        .map(|s| {
            json!({
                "type": "document",
                "source_id": s.source_id,
                "content": s.content,
                "score": s.score,
                "metadata": s.metadata,
            })
        })
        .collect()
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let preview: String = request.message.chars().take(50).collect();
    info!("Processing chat request: {}...", preview);

    let mut context = String::new();
    let mut sources = Vec::new();

    if request.use_rag {
        info!("Querying knowledge graph...");
        let result = natural_language_query(state.graph.as_ref(), &request.message)
            .await
            .map_err(|e| {
                error!("Error processing chat request: {}", e);
                ApiError::from(e)
            })?;

        context = graph_context(&result);
        if !context.is_empty() {
            sources.push(json!({ "type": "graph_query", "data": result }));
        }
    }

    if request.use_documents {
        let retrieved = state
            .documents
            .retrieve_context(&request.message, None)
            .await;
        if !retrieved.is_empty() {
            if !context.is_empty() {
                context.push('\n');
            }
            context.push_str("Document Results:\n");
            context.push_str(&retrieved.context);
            sources.extend(document_sources(&retrieved));
        }
    }

    info!("Generating response with OpenAI...");
    let reply = state
        .chat
        .generate_response(
            &request.message,
            &context,
            request.conversation_id.as_deref(),
        )
        .await
        .map_err(|e| {
            error!("Error processing chat request: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ChatResponse {
        response: reply.response,
        conversation_id: reply.conversation_id,
        sources: (!sources.is_empty()).then_some(sources),
    }))
}

pub async fn active_conversations(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let count = state.chat.conversations().active_conversations().await?;
    Ok(Json(json!({
        "status": "success",
        "active_conversations": count,
    })))
}

pub async fn clear_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.chat.conversations().clear(&conversation_id).await? {
        return Err(ApiError::NotFound(format!(
            "Conversation {} not found",
            conversation_id
        )));
    }

    Ok(Json(json!({
        "status": "success",
        "conversation_id": conversation_id,
    })))
}
