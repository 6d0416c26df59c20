//! Load relation CSVs into Neo4j

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Settings;
use crate::graph::{GraphLoader, GraphSummary, Neo4jGraph};

/// Loader configuration
pub struct LoadGraphConfig {
    /// Directory holding the CSV files, overrides `RELATIONS_DIR`
    pub dir: Option<PathBuf>,
    /// Wipe the graph before loading
    pub clear: bool,
}

pub async fn run(config: LoadGraphConfig) -> Result<GraphSummary> {
    let settings = Settings::from_env()?;
    let dir = config.dir.unwrap_or_else(|| settings.relations_dir.clone());

    let graph = Neo4jGraph::connect(
        &settings.neo4j_uri,
        &settings.neo4j_user,
        &settings.neo4j_password,
    )
    .await
    .context("Failed to connect to Neo4j")?;

    let summary = GraphLoader::new(&graph, &dir)
        .load_all(config.clear)
        .await
        .with_context(|| format!("Failed to load graph from {}", dir.display()))?;

    info!("Data loading completed successfully!");
    Ok(summary)
}
