//! Keyword-based intent routing for free-text graph questions.
//!
//! Rules are evaluated in a fixed order and the first match wins; there is no
//! scoring. A message such as "what runs on server12" therefore lists all
//! servers, because the list rule sits ahead of the server-detail rule.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use super::GraphStore;
use crate::error::Result;

/// Rows fetched by the list intents.
pub const INTENT_LIST_LIMIT: usize = 50;

const LIST_WORDS_SERVER: &[&str] = &["list", "show", "all", "what"];
const LIST_WORDS_APPLICATION: &[&str] = &["list", "show", "all"];
const OS_KEYWORDS: &[&str] = &["ubuntu", "windows", "centos", "linux", "rhel"];

static LOCATION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"loc\d+").expect("valid regex"));
static SERVER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"server\d+").expect("valid regex"));

/// Classified purpose of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ListServers,
    ListApplications,
    QueryByOs { os_name: String },
    QueryByLocation { location_id: String },
    ServerDetails { server_id: String },
    GeneralInfo,
}

type Rule = fn(&str) -> Option<Intent>;

/// Ordered rule list. `GeneralInfo` is the fallback when none match.
const RULES: &[(&str, Rule)] = &[
    ("list_servers", list_servers_rule),
    ("list_applications", list_applications_rule),
    ("query_by_os", os_rule),
    ("query_by_location", location_rule),
    ("server_details", server_rule),
];

fn list_servers_rule(q: &str) -> Option<Intent> {
    (q.contains("server") && LIST_WORDS_SERVER.iter().any(|w| q.contains(w)))
        .then_some(Intent::ListServers)
}

fn list_applications_rule(q: &str) -> Option<Intent> {
    (q.contains("application") && LIST_WORDS_APPLICATION.iter().any(|w| q.contains(w)))
        .then_some(Intent::ListApplications)
}

fn os_rule(q: &str) -> Option<Intent> {
    OS_KEYWORDS
        .iter()
        .find(|kw| q.contains(*kw))
        .map(|kw| Intent::QueryByOs {
            os_name: capitalize(kw),
        })
}

fn location_rule(q: &str) -> Option<Intent> {
    if !(q.contains("location") || q.contains("loc")) {
        return None;
    }
    LOCATION_ID.find(q).map(|m| Intent::QueryByLocation {
        location_id: m.as_str().to_string(),
    })
}

fn server_rule(q: &str) -> Option<Intent> {
    SERVER_ID.find(q).map(|m| Intent::ServerDetails {
        server_id: m.as_str().to_string(),
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Intent {
    /// Classify a free-text question. Matching is case-insensitive.
    pub fn classify(text: &str) -> Self {
        let q = text.to_lowercase();
        for (name, rule) in RULES {
            if let Some(intent) = rule(&q) {
                debug!(rule = name, "intent matched");
                return intent;
            }
        }
        Intent::GeneralInfo
    }

    /// Stable snake_case name reported to clients.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::ListServers => "list_servers",
            Intent::ListApplications => "list_applications",
            Intent::QueryByOs { .. } => "query_by_os",
            Intent::QueryByLocation { .. } => "query_by_location",
            Intent::ServerDetails { .. } => "server_details",
            Intent::GeneralInfo => "general_info",
        }
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Outcome of routing a question to a graph query.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQueryResult {
    pub intent: Intent,
    pub results: Vec<Value>,
    pub summary: String,
}

fn to_values<T: Serialize>(rows: &[T]) -> Result<Vec<Value>> {
    rows.iter()
        .map(|r| serde_json::to_value(r).map_err(Into::into))
        .collect()
}

/// Classify `text` and run the matching graph query.
pub async fn natural_language_query(
    graph: &dyn GraphStore,
    text: &str,
) -> Result<GraphQueryResult> {
    let intent = Intent::classify(text);

    let (results, summary) = match &intent {
        Intent::ListServers => {
            let rows = graph.servers(INTENT_LIST_LIMIT).await?;
            let summary = format!("Found {} servers", rows.len());
            (to_values(&rows)?, summary)
        }
        Intent::ListApplications => {
            let rows = graph.applications(INTENT_LIST_LIMIT).await?;
            let summary = format!("Found {} applications", rows.len());
            (to_values(&rows)?, summary)
        }
        Intent::QueryByOs { os_name } => {
            let rows = graph.applications_by_os(os_name).await?;
            let summary = format!(
                "Found {} applications on {} servers",
                rows.len(),
                os_name.to_lowercase()
            );
            (to_values(&rows)?, summary)
        }
        Intent::QueryByLocation { location_id } => {
            let rows = graph.servers_by_location(location_id).await?;
            let summary = format!("Found {} servers in {}", rows.len(), location_id);
            (to_values(&rows)?, summary)
        }
        Intent::ServerDetails { server_id } => {
            let rows: Vec<_> = graph.server_details(server_id).await?.into_iter().collect();
            (to_values(&rows)?, format!("Details for {}", server_id))
        }
        Intent::GeneralInfo => {
            let counts = graph.counts().await?;
            (
                to_values(&[counts])?,
                "Graph database statistics".to_string(),
            )
        }
    };

    debug!(
        intent = intent.name(),
        rows = results.len(),
        "natural language query answered"
    );

    Ok(GraphQueryResult {
        intent,
        results,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeRecord, MemoryGraph, NodeLabel, NodeRecord, Relationship};

    #[test]
    fn list_servers() {
        assert_eq!(Intent::classify("list all servers"), Intent::ListServers);
        assert_eq!(Intent::classify("What servers do we have?"), Intent::ListServers);
    }

    #[test]
    fn list_applications() {
        assert_eq!(
            Intent::classify("show all applications"),
            Intent::ListApplications
        );
    }

    #[test]
    fn query_by_os_capitalizes() {
        assert_eq!(
            Intent::classify("apps on ubuntu"),
            Intent::QueryByOs {
                os_name: "Ubuntu".to_string()
            }
        );
        assert_eq!(
            Intent::classify("anything on RHEL?"),
            Intent::QueryByOs {
                os_name: "Rhel".to_string()
            }
        );
    }

    #[test]
    fn os_keyword_order_decides_between_several() {
        // "windows" precedes "linux" in the keyword list
        assert_eq!(
            Intent::classify("linux or windows apps"),
            Intent::QueryByOs {
                os_name: "Windows".to_string()
            }
        );
    }

    #[test]
    fn query_by_location() {
        assert_eq!(
            Intent::classify("servers in loc3"),
            Intent::QueryByLocation {
                location_id: "loc3".to_string()
            }
        );
    }

    #[test]
    fn location_word_without_id_falls_through() {
        assert_eq!(
            Intent::classify("which location hosts server7"),
            Intent::ServerDetails {
                server_id: "server7".to_string()
            }
        );
        assert_eq!(Intent::classify("any location info"), Intent::GeneralInfo);
    }

    #[test]
    fn server_details() {
        assert_eq!(
            Intent::classify("details for server42"),
            Intent::ServerDetails {
                server_id: "server42".to_string()
            }
        );
    }

    #[test]
    fn first_rule_wins_on_overlap() {
        assert_eq!(Intent::classify("what is on server12"), Intent::ListServers);
        assert_eq!(
            Intent::classify("server on ubuntu"),
            Intent::QueryByOs {
                os_name: "Ubuntu".to_string()
            }
        );
    }

    #[test]
    fn fallback_is_general_info() {
        assert_eq!(Intent::classify("hello there"), Intent::GeneralInfo);
        assert_eq!(Intent::classify(""), Intent::GeneralInfo);
    }

    #[test]
    fn intent_serializes_as_name() {
        let json = serde_json::to_value(Intent::QueryByOs {
            os_name: "Ubuntu".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!("query_by_os"));
    }

    async fn sample_graph() -> MemoryGraph {
        let graph = MemoryGraph::new();
        graph
            .merge_nodes(
                NodeLabel::Server,
                &[NodeRecord::new("server1", "web-01"), NodeRecord::new("server2", "db-01")],
            )
            .await
            .unwrap();
        graph
            .merge_nodes(NodeLabel::Application, &[NodeRecord::new("app1", "nginx")])
            .await
            .unwrap();
        graph
            .merge_nodes(NodeLabel::Os, &[NodeRecord::new("os1", "Ubuntu 22.04")])
            .await
            .unwrap();
        graph
            .merge_nodes(NodeLabel::Location, &[NodeRecord::new("loc1", "loc1")])
            .await
            .unwrap();
        graph
            .merge_edges(Relationship::RunsOn, &[EdgeRecord::new("server1", "os1")])
            .await
            .unwrap();
        graph
            .merge_edges(Relationship::Hosts, &[EdgeRecord::new("server1", "app1")])
            .await
            .unwrap();
        graph
            .merge_edges(Relationship::LocatedIn, &[EdgeRecord::new("server1", "loc1")])
            .await
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn natural_query_lists_servers() {
        let graph = sample_graph().await;
        let result = natural_language_query(&graph, "list all servers").await.unwrap();

        assert_eq!(result.intent, Intent::ListServers);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.summary, "Found 2 servers");
    }

    #[tokio::test]
    async fn natural_query_by_os() {
        let graph = sample_graph().await;
        let result = natural_language_query(&graph, "apps on ubuntu").await.unwrap();

        assert_eq!(result.intent.name(), "query_by_os");
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0]["app_name"], "nginx");
        assert_eq!(result.summary, "Found 1 applications on ubuntu servers");
    }

    #[tokio::test]
    async fn natural_query_unknown_server_has_no_rows() {
        let graph = sample_graph().await;
        let result = natural_language_query(&graph, "details for server99").await.unwrap();

        assert_eq!(result.intent.name(), "server_details");
        assert!(result.results.is_empty());
        assert_eq!(result.summary, "Details for server99");
    }

    #[tokio::test]
    async fn natural_query_general_info_counts() {
        let graph = sample_graph().await;
        let result = natural_language_query(&graph, "tell me something").await.unwrap();

        assert_eq!(result.intent, Intent::GeneralInfo);
        assert_eq!(result.results[0]["server_count"], 2);
        assert_eq!(result.results[0]["app_count"], 1);
        assert_eq!(result.results[0]["os_count"], 1);
    }
}
