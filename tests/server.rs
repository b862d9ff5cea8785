//! HTTP API end to end: in-memory index, fake embedder, echo generator,
//! real axum server on an ephemeral port.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::{EchoGenerator, HistogramEmbedder};
use knowledge_copilot::config::{parse_config, Config};
use knowledge_copilot::copilot::{ChatAnswer, Copilot};
use knowledge_copilot::server::build_router;
use knowledge_copilot_core::embedding::Embedder;
use knowledge_copilot_core::models::{ChunkMetadata, SourceDocument};
use knowledge_copilot_core::store::memory::InMemoryIndex;

struct TestServer {
    base: String,
    copilot: Arc<Copilot>,
    client: reqwest::Client,
}

async fn start(config: Config) -> TestServer {
    let embedder: Arc<dyn Embedder> = Arc::new(HistogramEmbedder::default());
    let index = Arc::new(InMemoryIndex::new(embedder.clone()));
    let copilot =
        Arc::new(Copilot::new(config, embedder, index, Arc::new(EchoGenerator)).unwrap());

    let app = build_router(copilot.clone()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        copilot,
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Background ingestion is fire-and-forget; poll until it lands.
    async fn wait_for_sources(&self, expected: usize) -> Vec<Value> {
        for _ in 0..50 {
            let sources: Vec<Value> = self
                .client
                .get(self.url("/api/sources"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if sources.len() >= expected {
                return sources;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("background ingestion did not finish");
    }
}

#[tokio::test]
async fn test_health() {
    let server = start(Config::default()).await;
    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_chat_cites_sources_and_respects_filter() {
    let server = start(Config::default()).await;
    server
        .copilot
        .ingest(&[
            SourceDocument::new(
                "Laptops are issued by the IT desk.",
                ChunkMetadata::file("it-handbook.md", "text"),
            ),
            SourceDocument::new(
                "Laptop stipends are paid by finance.",
                ChunkMetadata::url("https://intranet/finance", "html"),
            ),
        ])
        .await
        .unwrap();

    let resp = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({"message": "Who issues laptops?", "source_type": "url"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: ChatAnswer = resp.json().await.unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].name, "https://intranet/finance");
    assert!(answer.answer.contains("Laptop stipends are paid by finance."));
    assert!(!answer.answer.contains("IT desk"));

    let all: ChatAnswer = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({"message": "Who issues laptops?", "top_k": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.sources.len(), 1);
}

#[tokio::test]
async fn test_empty_chat_message_is_bad_request() {
    let server = start(Config::default()).await;
    let resp = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_upload_ingests_in_background() {
    let server = start(Config::default()).await;
    let form = reqwest::multipart::Form::new()
        .part(
            "files",
            reqwest::multipart::Part::bytes("x".repeat(1750).into_bytes()).file_name("big.txt"),
        )
        .part(
            "files",
            reqwest::multipart::Part::bytes(b"# Onboarding\nDay one checklist.".to_vec())
                .file_name("onboarding.md"),
        );

    let resp = server
        .client
        .post(server.url("/api/ingest/files"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"inserted": 2, "source_type": "file"}));

    let sources = server.wait_for_sources(2).await;
    let names: Vec<&str> = sources.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"big.txt (3 chunks)"));
    assert!(names.contains(&"onboarding.md (1 chunks)"));
    assert!(sources.iter().all(|s| s["source_type"] == "file"));
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected() {
    let server = start(Config::default()).await;
    let form = reqwest::multipart::Form::new().part(
        "files",
        reqwest::multipart::Part::bytes(vec![0u8, 1, 2]).file_name("diagram.png"),
    );
    let resp = server
        .client
        .post(server.url("/api/ingest/files"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unsupported_media_type");
}

#[tokio::test]
async fn test_url_ingest_fetches_page() {
    let page = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/faq"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw(
            "<html><body><h1>FAQ</h1><p>Badges are printed at reception.</p></body></html>",
            "text/html",
        ))
        .mount(&page)
        .await;

    let server = start(Config::default()).await;
    let faq = format!("{}/faq", page.uri());
    let body: Value = server
        .client
        .post(server.url("/api/ingest/urls"))
        .json(&json!({"urls": [faq], "tags": ["onboarding"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"inserted": 1, "source_type": "url"}));

    let sources = server.wait_for_sources(1).await;
    assert_eq!(sources[0]["name"], format!("{} (1 chunks)", faq));
    assert_eq!(sources[0]["source_type"], "url");
}

#[tokio::test]
async fn test_mirror_status_and_chat_sync() {
    let server = start(Config::default()).await;
    let status: Value = server
        .client
        .get(server.url("/api/mirror/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({"state": "unconfigured"}));

    let mirror = TempDir::new().unwrap();
    std::fs::write(mirror.path().join("README.md"), "Release train leaves Thursday.").unwrap();
    let config = parse_config(&format!(
        "[mirror]\nroot = \"{}\"\nrepo_url = \"https://github.com/acme/releases\"\n",
        mirror.path().display()
    ))
    .unwrap();
    let server = start(config).await;

    let status: Value = server
        .client
        .get(server.url("/api/mirror/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "ready");
    assert_eq!(status["assets"], 1);

    let answer: ChatAnswer = server
        .client
        .post(server.url("/api/chat"))
        .json(&json!({"message": "When does the release train leave?", "enable_mcp": true}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].name, "README.md");
    assert!(answer.answer.contains("Release train leaves Thursday."));
}
