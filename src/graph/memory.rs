//! In-process graph backend.
//!
//! Mirrors the MERGE semantics of the Neo4j backend: nodes are keyed by id,
//! edges are a set keyed by their endpoints and are only created when both
//! endpoints already exist.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    EdgeRecord, GraphCounts, GraphStore, GraphSummary, LocatedServer, NodeLabel, NodeRecord,
    OsApplication, Relationship, ServerDetails,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct GraphData {
    servers: BTreeMap<String, String>,
    applications: BTreeMap<String, String>,
    oses: BTreeMap<String, String>,
    locations: BTreeMap<String, String>,
    runs_on: BTreeSet<(String, String)>,
    hosts: BTreeSet<(String, String)>,
    located_in: BTreeSet<(String, String)>,
}

impl GraphData {
    fn nodes(&self, label: NodeLabel) -> &BTreeMap<String, String> {
        match label {
            NodeLabel::Server => &self.servers,
            NodeLabel::Application => &self.applications,
            NodeLabel::Os => &self.oses,
            NodeLabel::Location => &self.locations,
        }
    }

    fn nodes_mut(&mut self, label: NodeLabel) -> &mut BTreeMap<String, String> {
        match label {
            NodeLabel::Server => &mut self.servers,
            NodeLabel::Application => &mut self.applications,
            NodeLabel::Os => &mut self.oses,
            NodeLabel::Location => &mut self.locations,
        }
    }

    fn target_label(relationship: Relationship) -> NodeLabel {
        match relationship {
            Relationship::RunsOn => NodeLabel::Os,
            Relationship::Hosts => NodeLabel::Application,
            Relationship::LocatedIn => NodeLabel::Location,
        }
    }

    fn edges_mut(&mut self, relationship: Relationship) -> &mut BTreeSet<(String, String)> {
        match relationship {
            Relationship::RunsOn => &mut self.runs_on,
            Relationship::Hosts => &mut self.hosts,
            Relationship::LocatedIn => &mut self.located_in,
        }
    }

    fn targets<'a>(
        edges: &'a BTreeSet<(String, String)>,
        server_id: &'a str,
    ) -> impl Iterator<Item = &'a String> + 'a {
        edges
            .iter()
            .filter(move |(start, _)| start == server_id)
            .map(|(_, end)| end)
    }

    fn os_name(&self, server_id: &str) -> Option<String> {
        Self::targets(&self.runs_on, server_id)
            .find_map(|os_id| self.oses.get(os_id))
            .cloned()
    }

    fn app_names(&self, server_id: &str) -> Vec<String> {
        let names: BTreeSet<&String> = Self::targets(&self.hosts, server_id)
            .filter_map(|app_id| self.applications.get(app_id))
            .collect();
        names.into_iter().cloned().collect()
    }
}

/// Graph kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    data: RwLock<GraphData>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

fn node_page(nodes: &BTreeMap<String, String>, limit: usize) -> Vec<NodeRecord> {
    nodes
        .iter()
        .take(limit)
        .map(|(id, name)| NodeRecord::new(id.clone(), name.clone()))
        .collect()
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn servers(&self, limit: usize) -> Result<Vec<NodeRecord>> {
        Ok(node_page(&self.data.read().await.servers, limit))
    }

    async fn applications(&self, limit: usize) -> Result<Vec<NodeRecord>> {
        Ok(node_page(&self.data.read().await.applications, limit))
    }

    async fn server_details(&self, server_id: &str) -> Result<Option<ServerDetails>> {
        let data = self.data.read().await;
        let Some(name) = data.servers.get(server_id) else {
            return Ok(None);
        };

        let location = GraphData::targets(&data.located_in, server_id)
            .find(|loc| data.locations.contains_key(*loc))
            .cloned();

        Ok(Some(ServerDetails {
            server_id: server_id.to_string(),
            server_name: name.clone(),
            operating_system: data.os_name(server_id),
            applications: data.app_names(server_id),
            location,
        }))
    }

    async fn applications_by_os(&self, os_name: &str) -> Result<Vec<OsApplication>> {
        let data = self.data.read().await;
        let mut rows = Vec::new();

        for (server_id, os_id) in &data.runs_on {
            let Some(os) = data.oses.get(os_id) else {
                continue;
            };
            if !os.contains(os_name) {
                continue;
            }
            let server_name = data.servers.get(server_id).cloned().unwrap_or_default();

            for app_id in GraphData::targets(&data.hosts, server_id) {
                if let Some(app_name) = data.applications.get(app_id) {
                    let row = OsApplication {
                        app_id: app_id.clone(),
                        app_name: app_name.clone(),
                        server_name: server_name.clone(),
                        os_name: os.clone(),
                    };
                    if !rows.contains(&row) {
                        rows.push(row);
                    }
                }
            }
        }

        Ok(rows)
    }

    async fn servers_by_location(&self, location_id: &str) -> Result<Vec<LocatedServer>> {
        let data = self.data.read().await;
        if !data.locations.contains_key(location_id) {
            return Ok(Vec::new());
        }

        Ok(data
            .located_in
            .iter()
            .filter(|(_, loc)| loc == location_id)
            .filter_map(|(server_id, _)| {
                let name = data.servers.get(server_id)?;
                Some(LocatedServer {
                    server_id: server_id.clone(),
                    server_name: name.clone(),
                    operating_system: data.os_name(server_id),
                    applications: data.app_names(server_id),
                })
            })
            .collect())
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let data = self.data.read().await;
        Ok(GraphCounts {
            server_count: data.servers.len() as i64,
            app_count: data.applications.len() as i64,
            os_count: data.oses.len() as i64,
        })
    }

    async fn summary(&self) -> Result<GraphSummary> {
        let data = self.data.read().await;
        Ok(GraphSummary {
            servers: data.servers.len() as i64,
            apps: data.applications.len() as i64,
            oses: data.oses.len() as i64,
            relationships: (data.runs_on.len() + data.hosts.len() + data.located_in.len()) as i64,
        })
    }

    async fn clear(&self) -> Result<()> {
        *self.data.write().await = GraphData::default();
        Ok(())
    }

    async fn create_constraints(&self) -> Result<()> {
        // Map keys already enforce unique ids.
        Ok(())
    }

    async fn merge_nodes(&self, label: NodeLabel, nodes: &[NodeRecord]) -> Result<usize> {
        let mut data = self.data.write().await;
        let target = data.nodes_mut(label);
        for node in nodes {
            target.insert(node.id.clone(), node.name.clone());
        }
        Ok(nodes.len())
    }

    async fn merge_edges(&self, relationship: Relationship, edges: &[EdgeRecord]) -> Result<usize> {
        let mut data = self.data.write().await;
        let target_label = GraphData::target_label(relationship);

        let valid: Vec<(String, String)> = edges
            .iter()
            .filter(|e| {
                data.servers.contains_key(&e.start) && data.nodes(target_label).contains_key(&e.end)
            })
            .map(|e| (e.start.clone(), e.end.clone()))
            .collect();

        data.edges_mut(relationship).extend(valid);
        Ok(edges.len())
    }
}
