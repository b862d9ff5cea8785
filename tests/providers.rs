//! Embedding and chat providers against mocked HTTP APIs.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use knowledge_copilot::embedding::{OllamaEmbedder, OpenAiEmbedder};
use knowledge_copilot::generate::{AnswerGenerator, GenerationError, OpenAiChat, SYSTEM_PROMPT};
use knowledge_copilot_core::embedding::Embedder;
use knowledge_copilot_core::CoreError;

fn openai(server: &MockServer) -> OpenAiEmbedder {
    OpenAiEmbedder::new(
        "text-embedding-3-small",
        server.uri(),
        Some("test-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_openai_embeds_batch_in_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vecs = openai(&server)
        .embed(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_openai_empty_input_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(openai(&server).embed(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_openai_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&server)
        .await;

    let err = openai(&server).embed(&["x".to_string()]).await.unwrap_err();
    match err {
        CoreError::EmbeddingProvider(msg) => assert!(msg.contains("429")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [1.0]}]
        })))
        .mount(&server)
        .await;

    let err = openai(&server)
        .embed(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::EmbeddingProvider(_)));
}

#[tokio::test]
async fn test_ollama_embed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "nomic-embed-text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.25, 0.5, 0.75]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new("nomic-embed-text", server.uri(), Duration::from_secs(5)).unwrap();
    let v = embedder.embed_query("hello").await.unwrap();
    assert_eq!(v, vec![0.25, 0.5, 0.75]);
}

#[tokio::test]
async fn test_chat_sends_grounded_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": "Context:\nLaptops come from IT.\n\nQuestion: Who issues laptops?\nProvide a concise answer with citations."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "IT issues laptops (Source 1)."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAiChat::new(
        "gpt-4o-mini",
        0.1,
        server.uri(),
        Some("test-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    let answer = chat
        .generate("Who issues laptops?", "Laptops come from IT.")
        .await
        .unwrap();
    assert_eq!(answer, "IT issues laptops (Source 1).");
}

#[tokio::test]
async fn test_chat_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let chat = OpenAiChat::new("m", 0.1, server.uri(), Some("k".into()), Duration::from_secs(5))
        .unwrap();
    let err = chat.generate("q", "c").await.unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: 500, .. }));
}
