//! Knowledge Graph Query Assistant - main entry point
//!
//! Unified CLI for serving the API and loading the graph.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kg_assistant::commands::{self, LoadGraphConfig, ServeConfig};

#[derive(Parser)]
#[command(name = "kg_assistant")]
#[command(about = "Knowledge Graph Query Assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (e.g., 0.0.0.0:8000)
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,
    },

    /// Load relation CSVs into Neo4j
    LoadGraph {
        /// Directory with servers.csv, applications.csv, ... (fallback: RELATIONS_DIR)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Delete all existing nodes and relationships first
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("kg_assistant=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => {
            commands::serve_run(ServeConfig { bind_addr: bind }).await?;
        }
        Commands::LoadGraph { dir, clear } => {
            let summary = commands::load_graph_run(LoadGraphConfig { dir, clear }).await?;
            info!(
                servers = summary.servers,
                applications = summary.apps,
                oses = summary.oses,
                relationships = summary.relationships,
                "Graph loaded"
            );
        }
    }

    Ok(())
}
