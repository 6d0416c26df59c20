//! Integration tests for the kg_assistant HTTP API
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`, the
//! graph lives in memory (loaded from CSV fixtures), the completion API is an
//! httpmock server and the document index uses local embeddings in a temp dir.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use kg_assistant::api::{self, AppState};
use kg_assistant::graph::{GraphLoader, GraphStore, MemoryGraph};
use kg_assistant::retrieval::{LocalEmbedder, TextSplitter, VectorIndex};
use kg_assistant::{ChatEngine, InMemoryConversationStore, OpenAIClient, Settings};

// ============================================================================
// Fixtures
// ============================================================================

const APP_NAME: &str = "Test Graph Assistant";

fn write_relations(dir: &Path) {
    let files = [
        (
            "servers.csv",
            "id,name\nserver1,web-01\nserver2,db-01\nserver3,cache-01\n",
        ),
        (
            "applications.csv",
            "id,name\napp1,nginx\napp2,postgres\napp3,redis\n",
        ),
        ("oses.csv", "id,name\nos1,Ubuntu 22.04\nos2,Windows Server 2019\n"),
        ("runs_on.csv", "start,end\nserver1,os1\nserver2,os1\nserver3,os2\n"),
        ("hosts.csv", "start,end\nserver1,app1\nserver2,app2\nserver3,app3\n"),
        (
            "located_in.csv",
            "start,end\nserver1,loc1\nserver2,loc1\nserver3,loc2\n",
        ),
    ];
    for (name, body) in files {
        std::fs::write(dir.join(name), body).expect("write fixture");
    }
}

fn test_settings() -> Settings {
    let vars: HashMap<&str, &str> = [("OPENAI_API_KEY", "test_key"), ("APP_NAME", APP_NAME)]
        .into_iter()
        .collect();
    Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string())).expect("settings")
}

struct TestApp {
    app: Router,
    llm: MockServer,
    _dirs: (TempDir, TempDir),
}

async fn test_app() -> TestApp {
    let relations = TempDir::new().expect("tempdir");
    write_relations(relations.path());

    let graph = Arc::new(MemoryGraph::new());
    GraphLoader::new(graph.as_ref(), relations.path())
        .load_all(false)
        .await
        .expect("load fixtures");

    let llm = MockServer::start_async().await;
    let client = OpenAIClient::new("test_key")
        .expect("client")
        .with_base_url(llm.base_url());
    let chat = ChatEngine::new(
        client,
        Arc::new(InMemoryConversationStore::new()),
        "gpt-4o-mini",
        0.7,
        1000,
    );

    let index_dir = TempDir::new().expect("tempdir");
    let documents = VectorIndex::create(
        Arc::new(LocalEmbedder::new(128)),
        TextSplitter::new(1000, 200),
        3,
        index_dir.path(),
    );

    let graph: Arc<dyn GraphStore> = graph;
    let state = AppState {
        graph,
        chat: Arc::new(chat),
        documents: Arc::new(documents),
        settings: Arc::new(test_settings()),
    };

    TestApp {
        app: api::router(state),
        llm,
        _dirs: (relations, index_dir),
    }
}

fn completion(content: &str) -> Value {
    json!({
        "choices": [ { "message": { "role": "assistant", "content": content } } ],
        "usage": { "prompt_tokens": 50, "completion_tokens": 10, "total_tokens": 60 }
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, text) = send_raw(app, request).await;
    let value = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, value)
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], APP_NAME);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let t = test_app().await;
    let (status, _) = send(&t.app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Graph endpoints
// ============================================================================

#[tokio::test]
async fn test_graph_summary() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/graph/summary")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(
        body["summary"],
        json!({ "servers": 3, "apps": 3, "oses": 2, "relationships": 9 })
    );
}

#[tokio::test]
async fn test_graph_servers_respects_limit() {
    let t = test_app().await;

    let (status, body) = send(&t.app, get("/graph/servers?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["servers"].as_array().unwrap().len(), 2);

    let (_, body) = send(&t.app, get("/graph/servers")).await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["servers"][0], json!({ "id": "server1", "name": "web-01" }));
}

#[tokio::test]
async fn test_graph_applications() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/graph/applications")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let names: Vec<&str> = body["applications"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert_eq!(names, vec!["nginx", "postgres", "redis"]);
}

#[tokio::test]
async fn test_graph_server_details() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/graph/server/server3")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["server"],
        json!({
            "server_id": "server3",
            "server_name": "cache-01",
            "operating_system": "Windows Server 2019",
            "applications": ["redis"],
            "location": "loc2"
        })
    );
}

#[tokio::test]
async fn test_graph_missing_server_is_404() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/graph/server/server99")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Server server99 not found" }));
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
async fn test_chat_with_graph_context() {
    let t = test_app().await;
    let mock = t.llm.mock(|when, then| {
        when.method(POST).path("/chat/completions").is_true(|req| {
            let body = String::from_utf8_lossy(req.body().as_ref());
            body.contains("Graph Query Results (list_servers)") && body.contains("Found 3 servers")
        });
        then.status(200).json_body(completion("There are three servers."));
    });

    let (status, body) = send(
        &t.app,
        post_json("/chat", json!({ "message": "list all servers" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    mock.assert_calls(1);
    assert_eq!(body["response"], "There are three servers.");
    assert!(!body["conversation_id"].as_str().unwrap().is_empty());
    assert_eq!(body["sources"][0]["type"], "graph_query");
    assert_eq!(body["sources"][0]["data"]["intent"], "list_servers");
    assert_eq!(body["sources"][0]["data"]["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_chat_without_rag_has_no_sources() {
    let t = test_app().await;
    let mock = t.llm.mock(|when, then| {
        when.method(POST).path("/chat/completions").is_true(|req| {
            let body = String::from_utf8_lossy(req.body().as_ref());
            !body.contains("Graph Query Results")
        });
        then.status(200).json_body(completion("Hello!"));
    });

    let (status, body) = send(
        &t.app,
        post_json("/chat", json!({ "message": "list all servers", "use_rag": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    mock.assert_calls(1);
    assert!(body.get("sources").is_none());
}

#[tokio::test]
async fn test_chat_keeps_conversation() {
    let t = test_app().await;
    t.llm.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion("Noted."));
    });

    let (_, first) = send(
        &t.app,
        post_json("/chat", json!({ "message": "hello", "use_rag": false })),
    )
    .await;
    let conversation_id = first["conversation_id"].as_str().unwrap().to_string();

    let (_, second) = send(
        &t.app,
        post_json(
            "/chat",
            json!({ "message": "again", "conversation_id": conversation_id, "use_rag": false }),
        ),
    )
    .await;
    assert_eq!(second["conversation_id"], conversation_id.as_str());

    let (status, body) = send(&t.app, get("/conversations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_conversations"], 1);

    let uri = format!("/conversations/{}", conversation_id);
    let (status, _) = send(&t.app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_chat_llm_failure_is_500_with_detail() {
    let t = test_app().await;
    t.llm.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(503).body("upstream unavailable");
    });

    let (status, body) = send(&t.app, post_json("/chat", json!({ "message": "hi" }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("503"));
    assert!(detail.contains("upstream unavailable"));
}

#[tokio::test]
async fn test_chat_with_document_context() {
    let t = test_app().await;
    let mock = t.llm.mock(|when, then| {
        when.method(POST).path("/chat/completions").is_true(|req| {
            let body = String::from_utf8_lossy(req.body().as_ref());
            body.contains("Document Results") && body.contains("[Source 1]")
        });
        then.status(200).json_body(completion("nginx terminates TLS."));
    });

    let (status, _) = send(
        &t.app,
        post_json(
            "/documents",
            json!({ "content": "nginx terminates TLS for the storefront" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &t.app,
        post_json(
            "/chat",
            json!({
                "message": "nginx terminates TLS for the storefront",
                "use_rag": false,
                "use_documents": true
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    mock.assert_calls(1);
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["type"], "document");
    assert_eq!(sources[0]["source_id"], 1);
}

// ============================================================================
// Documents
// ============================================================================

#[tokio::test]
async fn test_document_lifecycle() {
    let t = test_app().await;

    let (_, body) = send(&t.app, get("/documents/count")).await;
    assert_eq!(body["count"], 0);

    let (status, body) = send(
        &t.app,
        post_json(
            "/documents",
            json!({
                "content": "postgres replicas live in loc1",
                "metadata": { "source": "runbook" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    let document_id = body["document_id"].as_str().unwrap().to_string();

    let (_, body) = send(&t.app, get("/documents/count")).await;
    assert_eq!(body["count"], 1);

    let (status, body) = send(
        &t.app,
        post_json(
            "/documents/search",
            json!({ "query": "postgres replicas live in loc1", "top_k": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["context"]
        .as_str()
        .unwrap()
        .starts_with("[Source 1]\npostgres replicas"));
    assert_eq!(body["sources"][0]["metadata"]["doc_id"], document_id.as_str());
    assert_eq!(body["sources"][0]["metadata"]["source"], "runbook");
    assert!(body["sources"][0]["score"].as_f64().unwrap() < 1e-4);

    let (status, body) = send(&t.app, delete("/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, body) = send(&t.app, get("/documents/count")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_document_search_on_empty_index() {
    let t = test_app().await;
    let (status, body) = send(
        &t.app,
        post_json("/documents/search", json!({ "query": "anything" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "context": "", "sources": [] }));
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_endpoint_reports_requests() {
    let t = test_app().await;
    send(&t.app, get("/graph/summary")).await;

    let (status, text) = send_raw(&t.app, get("/metrics")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("kg_assistant_http_requests_total"));
    assert!(text.contains("route=\"/graph/summary\""));
}
