//! Graph database integration with Neo4j

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::{query, BoltType, Graph, Query, Row};
use tracing::{debug, info, warn};

use super::{
    EdgeRecord, GraphCounts, GraphStore, GraphSummary, LocatedServer, NodeLabel, NodeRecord,
    OsApplication, Relationship, ServerDetails,
};
use crate::error::{Error, Result};

const SERVERS: &str = "
    MATCH (s:Server)
    RETURN s.id AS id, s.name AS name
    LIMIT $limit";

const APPLICATIONS: &str = "
    MATCH (a:Application)
    RETURN a.id AS id, a.name AS name
    LIMIT $limit";

const SERVER_DETAILS: &str = "
    MATCH (s:Server {id: $server_id})
    OPTIONAL MATCH (s)-[:RUNS_ON]->(os:OS)
    OPTIONAL MATCH (s)-[:HOSTS]->(app:Application)
    OPTIONAL MATCH (s)-[:LOCATED_IN]->(loc:Location)
    RETURN s.id AS server_id,
           s.name AS server_name,
           os.name AS operating_system,
           collect(DISTINCT app.name) AS applications,
           loc.id AS location";

const APPLICATIONS_BY_OS: &str = "
    MATCH (s:Server)-[:RUNS_ON]->(os:OS)
    WHERE os.name CONTAINS $os_name
    MATCH (s)-[:HOSTS]->(app:Application)
    RETURN DISTINCT app.id AS app_id, app.name AS app_name,
           s.name AS server_name, os.name AS os_name";

const SERVERS_BY_LOCATION: &str = "
    MATCH (s:Server)-[:LOCATED_IN]->(loc:Location {id: $location_id})
    OPTIONAL MATCH (s)-[:RUNS_ON]->(os:OS)
    OPTIONAL MATCH (s)-[:HOSTS]->(app:Application)
    RETURN s.id AS server_id, s.name AS server_name,
           os.name AS operating_system,
           collect(app.name) AS applications";

// Every stage is OPTIONAL so an empty label counts as zero instead of
// dropping the row.
const COUNTS: &str = "
    OPTIONAL MATCH (s:Server) WITH count(s) AS server_count
    OPTIONAL MATCH (a:Application) WITH server_count, count(a) AS app_count
    OPTIONAL MATCH (os:OS) WITH server_count, app_count, count(os) AS os_count
    RETURN server_count, app_count, os_count";

const SUMMARY: &str = "
    OPTIONAL MATCH (s:Server) WITH count(s) AS servers
    OPTIONAL MATCH (a:Application) WITH servers, count(a) AS apps
    OPTIONAL MATCH (os:OS) WITH servers, apps, count(os) AS oses
    OPTIONAL MATCH ()-[r]->() WITH servers, apps, oses, count(r) AS relationships
    RETURN servers, apps, oses, relationships";

/// Graph store backed by Neo4j
pub struct Neo4jGraph {
    graph: Graph,
}

impl Neo4jGraph {
    /// Connect to the Neo4j server and verify the connection works.
    ///
    /// An unreachable server or rejected credentials is a
    /// [`Error::ConnectionError`]; callers treat it as fatal.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        info!("Connecting to Neo4j at {}...", uri);
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| Error::ConnectionError(format!("{}: {}", uri, e)))?;

        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| Error::ConnectionError(format!("{}: {}", uri, e)))?;

        info!("Neo4j connection verified");
        Ok(Self { graph })
    }

    /// Run arbitrary Cypher with parameters and return every row.
    pub async fn execute_query(&self, cypher: &str, params: Vec<(&str, BoltType)>) -> Result<Vec<Row>> {
        let mut q = query(cypher);
        for (key, value) in params {
            q = q.param(key, value);
        }
        self.fetch(q).await
    }

    async fn fetch(&self, q: Query) -> Result<Vec<Row>> {
        let mut stream = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

fn text(row: &Row, key: &str) -> String {
    row.get::<String>(key).unwrap_or_default()
}

fn maybe_text(row: &Row, key: &str) -> Option<String> {
    row.get::<String>(key).ok()
}

fn count(row: &Row, key: &str) -> i64 {
    row.get::<i64>(key).unwrap_or(0)
}

/// `LIMIT` parameter; values past `i64::MAX` saturate.
fn bolt_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// Labels and relationship types come from our enums, never from input.
fn merge_nodes_cypher(label: NodeLabel) -> String {
    format!(
        "UNWIND $rows AS row
         MERGE (n:{} {{id: row.id}})
         SET n.name = row.name",
        label.as_str()
    )
}

fn merge_edges_cypher(relationship: Relationship) -> String {
    format!(
        "UNWIND $rows AS row
         MATCH (s:Server {{id: row.start}})
         MATCH (t:{} {{id: row.end}})
         MERGE (s)-[:{}]->(t)",
        relationship.target_label(),
        relationship.as_str()
    )
}

fn node_rows(nodes: &[NodeRecord]) -> Vec<HashMap<String, String>> {
    nodes
        .iter()
        .map(|n| {
            HashMap::from([
                ("id".to_string(), n.id.clone()),
                ("name".to_string(), n.name.clone()),
            ])
        })
        .collect()
}

fn edge_rows(edges: &[EdgeRecord]) -> Vec<HashMap<String, String>> {
    edges
        .iter()
        .map(|e| {
            HashMap::from([
                ("start".to_string(), e.start.clone()),
                ("end".to_string(), e.end.clone()),
            ])
        })
        .collect()
}

fn node_record(row: &Row) -> NodeRecord {
    NodeRecord::new(text(row, "id"), text(row, "name"))
}

#[async_trait]
impl GraphStore for Neo4jGraph {
    async fn servers(&self, limit: usize) -> Result<Vec<NodeRecord>> {
        let rows = self
            .fetch(query(SERVERS).param("limit", bolt_limit(limit)))
            .await?;
        Ok(rows.iter().map(node_record).collect())
    }

    async fn applications(&self, limit: usize) -> Result<Vec<NodeRecord>> {
        let rows = self
            .fetch(query(APPLICATIONS).param("limit", bolt_limit(limit)))
            .await?;
        Ok(rows.iter().map(node_record).collect())
    }

    async fn server_details(&self, server_id: &str) -> Result<Option<ServerDetails>> {
        let rows = self
            .fetch(query(SERVER_DETAILS).param("server_id", server_id))
            .await?;

        Ok(rows.first().map(|row| ServerDetails {
            server_id: text(row, "server_id"),
            server_name: text(row, "server_name"),
            operating_system: maybe_text(row, "operating_system"),
            applications: row.get::<Vec<String>>("applications").unwrap_or_default(),
            location: maybe_text(row, "location"),
        }))
    }

    async fn applications_by_os(&self, os_name: &str) -> Result<Vec<OsApplication>> {
        let rows = self
            .fetch(query(APPLICATIONS_BY_OS).param("os_name", os_name))
            .await?;

        Ok(rows
            .iter()
            .map(|row| OsApplication {
                app_id: text(row, "app_id"),
                app_name: text(row, "app_name"),
                server_name: text(row, "server_name"),
                os_name: text(row, "os_name"),
            })
            .collect())
    }

    async fn servers_by_location(&self, location_id: &str) -> Result<Vec<LocatedServer>> {
        let rows = self
            .fetch(query(SERVERS_BY_LOCATION).param("location_id", location_id))
            .await?;

        Ok(rows
            .iter()
            .map(|row| LocatedServer {
                server_id: text(row, "server_id"),
                server_name: text(row, "server_name"),
                operating_system: maybe_text(row, "operating_system"),
                applications: row.get::<Vec<String>>("applications").unwrap_or_default(),
            })
            .collect())
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let rows = self.fetch(query(COUNTS)).await?;
        Ok(rows
            .first()
            .map(|row| GraphCounts {
                server_count: count(row, "server_count"),
                app_count: count(row, "app_count"),
                os_count: count(row, "os_count"),
            })
            .unwrap_or_default())
    }

    async fn summary(&self) -> Result<GraphSummary> {
        let rows = self.fetch(query(SUMMARY)).await?;
        Ok(rows
            .first()
            .map(|row| GraphSummary {
                servers: count(row, "servers"),
                apps: count(row, "apps"),
                oses: count(row, "oses"),
                relationships: count(row, "relationships"),
            })
            .unwrap_or_default())
    }

    async fn clear(&self) -> Result<()> {
        info!("Clearing existing data from Neo4j...");
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        info!("Database cleared");
        Ok(())
    }

    async fn create_constraints(&self) -> Result<()> {
        info!("Creating constraints...");
        for label in NodeLabel::ALL {
            let cypher = format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
                label.as_str()
            );
            if let Err(e) = self.graph.run(query(&cypher)).await {
                warn!("Constraint for {} may already exist: {}", label.as_str(), e);
            }
        }
        info!("Constraints created");
        Ok(())
    }

    async fn merge_nodes(&self, label: NodeLabel, nodes: &[NodeRecord]) -> Result<usize> {
        if nodes.is_empty() {
            return Ok(0);
        }

        let q = query(&merge_nodes_cypher(label)).param("rows", node_rows(nodes));
        self.graph.run(q).await?;

        debug!("Merged {} {} nodes", nodes.len(), label.as_str());
        Ok(nodes.len())
    }

    async fn merge_edges(&self, relationship: Relationship, edges: &[EdgeRecord]) -> Result<usize> {
        if edges.is_empty() {
            return Ok(0);
        }

        let q = query(&merge_edges_cypher(relationship)).param("rows", edge_rows(edges));
        self.graph.run(q).await?;

        debug!("Merged {} {} relationships", edges.len(), relationship.as_str());
        Ok(edges.len())
    }
}
