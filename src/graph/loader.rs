//! CSV batch loader for the infrastructure graph
//!
//! Reads the fixed-schema relation files and merges them into a
//! [`GraphStore`]. Nodes are loaded before edges so every relationship finds
//! both endpoints; re-running against the same files changes nothing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::{EdgeRecord, GraphStore, GraphSummary, NodeLabel, NodeRecord, Relationship};
use crate::error::{Error, Result};

pub const SERVERS_FILE: &str = "servers.csv";
pub const APPLICATIONS_FILE: &str = "applications.csv";
pub const OSES_FILE: &str = "oses.csv";
pub const RUNS_ON_FILE: &str = "runs_on.csv";
pub const HOSTS_FILE: &str = "hosts.csv";
pub const LOCATED_IN_FILE: &str = "located_in.csv";

/// Loads relation CSVs from a directory into a graph store.
pub struct GraphLoader<'a> {
    graph: &'a dyn GraphStore,
    dir: PathBuf,
}

impl<'a> GraphLoader<'a> {
    pub fn new(graph: &'a dyn GraphStore, dir: impl Into<PathBuf>) -> Self {
        Self {
            graph,
            dir: dir.into(),
        }
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        read_csv(&path)
    }

    /// Load every file. With `clear_first` the store is wiped beforehand.
    pub async fn load_all(&self, clear_first: bool) -> Result<GraphSummary> {
        info!("Loading graph from {}", self.dir.display());

        let servers: Vec<NodeRecord> = self.read(SERVERS_FILE)?;
        let applications: Vec<NodeRecord> = self.read(APPLICATIONS_FILE)?;
        let oses: Vec<NodeRecord> = self.read(OSES_FILE)?;
        let runs_on: Vec<EdgeRecord> = self.read(RUNS_ON_FILE)?;
        let hosts: Vec<EdgeRecord> = self.read(HOSTS_FILE)?;
        let located_in: Vec<EdgeRecord> = self.read(LOCATED_IN_FILE)?;

        if clear_first {
            self.graph.clear().await?;
        }

        if let Err(e) = self.graph.create_constraints().await {
            warn!("Failed to create constraints: {}", e);
        }

        let locations = locations_from(&located_in);

        let nodes = [
            (NodeLabel::Server, &servers),
            (NodeLabel::Application, &applications),
            (NodeLabel::Os, &oses),
            (NodeLabel::Location, &locations),
        ];
        for (label, records) in nodes {
            let n = self.graph.merge_nodes(label, records).await?;
            info!("Loaded {} {} nodes", n, label.as_str());
        }

        let edges = [
            (Relationship::RunsOn, &runs_on),
            (Relationship::Hosts, &hosts),
            (Relationship::LocatedIn, &located_in),
        ];
        for (relationship, records) in edges {
            let n = self.graph.merge_edges(relationship, records).await?;
            info!("Loaded {} {} relationships", n, relationship.as_str());
        }

        let summary = self.graph.summary().await?;
        info!(
            "Graph summary: {} servers, {} applications, {} OSes, {} relationships",
            summary.servers, summary.apps, summary.oses, summary.relationships
        );
        Ok(summary)
    }
}

/// Location nodes are implied by the located-in edges; the id doubles as name.
fn locations_from(edges: &[EdgeRecord]) -> Vec<NodeRecord> {
    edges
        .iter()
        .map(|e| e.end.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|id| NodeRecord::new(id, id))
        .collect()
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::CsvError(format!("{}: {}", path.display(), e)))?;

    reader
        .deserialize()
        .map(|row| row.map_err(|e| Error::CsvError(format!("{}: {}", path.display(), e))))
        .collect()
}
