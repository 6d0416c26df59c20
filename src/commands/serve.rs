//! Run the HTTP API

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{self, AppState};
use crate::chat::ChatEngine;
use crate::config::Settings;
use crate::conversation::InMemoryConversationStore;
use crate::graph::Neo4jGraph;
use crate::metrics;
use crate::retrieval::{embeddings, VectorIndex};

/// Serve configuration
pub struct ServeConfig {
    /// Listen address, overrides `BIND_ADDR`
    pub bind_addr: Option<String>,
}

/// Wire every component from settings into the shared state.
///
/// The graph connection is checked eagerly; an unreachable database aborts
/// startup. The document index stays unopened until first use.
pub async fn build_state(settings: Settings) -> Result<AppState> {
    let graph = Neo4jGraph::connect(
        &settings.neo4j_uri,
        &settings.neo4j_user,
        &settings.neo4j_password,
    )
    .await
    .context("Failed to connect to Neo4j")?;

    let conversations = Arc::new(InMemoryConversationStore::new());
    let chat = ChatEngine::from_settings(&settings, conversations)?;
    let documents = VectorIndex::from_settings(&settings, embeddings::from_settings(&settings));

    Ok(AppState {
        graph: Arc::new(graph),
        chat: Arc::new(chat),
        documents: Arc::new(documents),
        settings: Arc::new(settings),
    })
}

pub async fn run(config: ServeConfig) -> Result<()> {
    let settings = Settings::from_env()?;
    let addr = config
        .bind_addr
        .unwrap_or_else(|| settings.bind_addr.clone());

    info!("Starting {}...", settings.app_name);
    let state = build_state(settings).await?;
    metrics::init_collectors();

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on http://{}", addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
