//! HTTP API
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | health check |
//! | POST | `/chat` | chat with graph and document context |
//! | GET | `/conversations` | number of live conversations |
//! | DELETE | `/conversations/{id}` | forget a conversation |
//! | GET | `/graph/summary` | node and relationship totals |
//! | GET | `/graph/servers?limit=` | servers |
//! | GET | `/graph/applications?limit=` | applications |
//! | GET | `/graph/server/{id}` | one server, 404 if unknown |
//! | POST / DELETE | `/documents` | index a document / clear the index |
//! | POST | `/documents/search` | retrieve document context |
//! | GET | `/documents/count` | indexed chunks |
//! | GET | `/metrics` | Prometheus metrics |

pub mod chat;
pub mod documents;
pub mod error;
pub mod graph;

use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::ChatEngine;
use crate::config::Settings;
use crate::graph::GraphStore;
use crate::metrics;
use crate::retrieval::VectorIndex;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<dyn GraphStore>,
    pub chat: Arc<ChatEngine>,
    pub documents: Arc<VectorIndex>,
    pub settings: Arc<Settings>,
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.settings.app_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/chat", post(chat::chat))
        .route("/conversations", get(chat::active_conversations))
        .route(
            "/conversations/:conversation_id",
            delete(chat::clear_conversation),
        )
        .route("/graph/summary", get(graph::summary))
        .route("/graph/servers", get(graph::servers))
        .route("/graph/applications", get(graph::applications))
        .route("/graph/server/:server_id", get(graph::server_details))
        .route("/documents", post(documents::add).delete(documents::clear))
        .route("/documents/search", post(documents::search))
        .route("/documents/count", get(documents::count))
        .route("/metrics", get(metrics::metrics_handler))
        .route_layer(middleware::from_fn(metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
