//! Offline batch loader: reads relation CSVs and merges them into Neo4j

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kg_assistant::commands::{load_graph_run, LoadGraphConfig};

#[derive(Parser)]
#[command(name = "load_graph")]
#[command(about = "Load servers, applications, OSes and their relationships into Neo4j")]
struct Cli {
    /// Directory with the relation CSV files (fallback: RELATIONS_DIR)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Delete all existing nodes and relationships first
    #[arg(long, default_value_t = false)]
    clear: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("kg_assistant=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting graph data load...");

    let summary = load_graph_run(LoadGraphConfig {
        dir: cli.dir,
        clear: cli.clear,
    })
    .await?;

    println!("Servers:       {}", summary.servers);
    println!("Applications:  {}", summary.apps);
    println!("OSes:          {}", summary.oses);
    println!("Relationships: {}", summary.relationships);
    Ok(())
}
