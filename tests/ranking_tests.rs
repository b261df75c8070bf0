//! Tool ranking against a mock embeddings endpoint.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use vox_agent::config::{EmbeddingConfig, RankerBackend, ToolSelectionConfig};
use vox_agent::ranking::{EmbeddingClient, HttpEmbeddingClient, ToolRanker};
use vox_agent::tools::ToolCatalogEntry;

fn entry(provider: &str, native: &str, description: &str) -> ToolCatalogEntry {
    ToolCatalogEntry {
        unique_id: format!("{provider}:{native}"),
        provider_name: provider.into(),
        native_name: native.into(),
        description: description.into(),
        parameter_schema: json!({
            "type": "object",
            "properties": { "city": { "type": "string", "description": "City name" } }
        }),
        provider_metadata: serde_json::Map::new(),
    }
}

fn catalog() -> Vec<ToolCatalogEntry> {
    vec![
        entry("weather", "forecast", "Get the weather forecast for a city"),
        entry("home", "lights_on", "Switch on the lights in a room"),
    ]
}

/// Embeds by topic: anything about light or brightness, anything about weather, everything else.
struct TopicEmbeddings {
    fail_queries: bool,
    zeros: bool,
}

impl Respond for TopicEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let input = body["input"].as_str().unwrap_or_default().to_lowercase();

        if self.fail_queries && !input.starts_with("tool name:") {
            return ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "embedding model overloaded"}}));
        }

        let vector = if self.zeros {
            vec![0.0, 0.0, 0.0]
        } else if input.contains("light") || input.contains("brighten") {
            vec![1.0, 0.0, 0.1]
        } else if input.contains("weather") || input.contains("rain") {
            vec![0.0, 1.0, 0.1]
        } else {
            vec![0.0, 0.0, 1.0]
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": vector }],
            "model": body["model"],
        }))
    }
}

async fn embedding_server(responder: TopicEmbeddings) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer emb-key"))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

fn embedding_config(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        url: format!("{}/v1/embeddings", server.uri()),
        model: "test-embedder".into(),
        api_key: "emb-key".into(),
        dimensions: 3,
        timeout_secs: 5,
        cache_capacity: 16,
    }
}

async fn semantic_ranker(server: &MockServer, top_k: usize) -> ToolRanker {
    let selection = ToolSelectionConfig {
        top_k,
        backend: RankerBackend::Semantic,
    };
    let mut ranker =
        ToolRanker::from_config(&selection, &embedding_config(server)).expect("ranker builds");
    ranker.build_index(&catalog()).await;
    ranker
}

#[tokio::test]
async fn semantic_ranking_matches_meaning_without_shared_words() {
    let server = embedding_server(TopicEmbeddings {
        fail_queries: false,
        zeros: false,
    })
    .await;
    let ranker = semantic_ranker(&server, 1).await;

    let stats = ranker.stats();
    assert_eq!(stats.tool_vectors, 2);
    assert_eq!(stats.embedding_model.as_deref(), Some("test-embedder"));

    let top = ranker.rank("brighten the kitchen").await;
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].unique_id, "home:lights_on");

    // lexical scoring alone cannot separate these
    let mut lexical = ToolRanker::lexical(1);
    lexical.build_index(&catalog()).await;
    assert_eq!(lexical.rank("brighten the kitchen").await[0].unique_id, "weather:forecast");
}

#[tokio::test]
async fn repeated_queries_are_served_from_the_cache() {
    let server = embedding_server(TopicEmbeddings {
        fail_queries: false,
        zeros: false,
    })
    .await;
    let ranker = semantic_ranker(&server, 2).await;

    ranker.rank("will it rain tomorrow").await;
    let top = ranker.rank("will it rain tomorrow").await;
    assert_eq!(top[0].unique_id, "weather:forecast");

    let requests = server.received_requests().await.expect("recording is on");
    // two tool descriptions plus one query
    assert_eq!(requests.len(), 3);
    let stats = ranker.stats();
    assert_eq!(stats.cached_queries, 1);
    assert_eq!(stats.query_cache_hits, 1);
    assert_eq!(stats.query_cache_misses, 1);
}

#[tokio::test]
async fn all_zero_embeddings_fall_back_to_lexical() {
    let server = embedding_server(TopicEmbeddings {
        fail_queries: false,
        zeros: true,
    })
    .await;
    let ranker = semantic_ranker(&server, 1).await;

    assert_eq!(ranker.stats().tool_vectors, 0);
    let top = ranker.rank("turn on the lights").await;
    assert_eq!(top[0].unique_id, "home:lights_on");
}

#[tokio::test]
async fn failing_query_embedding_falls_back_to_lexical() {
    let server = embedding_server(TopicEmbeddings {
        fail_queries: true,
        zeros: false,
    })
    .await;
    let ranker = semantic_ranker(&server, 1).await;

    assert_eq!(ranker.stats().tool_vectors, 2);
    let top = ranker.rank("weather in Paris").await;
    assert_eq!(top[0].unique_id, "weather:forecast");
    assert_eq!(ranker.stats().cached_queries, 0);
}

#[tokio::test]
async fn embedding_client_surfaces_api_errors() {
    let server = embedding_server(TopicEmbeddings {
        fail_queries: true,
        zeros: false,
    })
    .await;
    let client = HttpEmbeddingClient::from_config(&embedding_config(&server)).expect("client builds");

    let err = client.embed("hello").await.expect_err("query embeddings fail");
    assert!(err.to_string().contains("embedding model overloaded"));
    assert_eq!(client.dimensions(), 3);
}

#[tokio::test]
async fn embedding_request_carries_model_and_dimensions() {
    let server = embedding_server(TopicEmbeddings {
        fail_queries: false,
        zeros: false,
    })
    .await;
    let client: Arc<dyn EmbeddingClient> = Arc::new(
        HttpEmbeddingClient::from_config(&embedding_config(&server)).expect("client builds"),
    );

    let vector = client.embed("lights please").await.expect("embedding succeeds");
    assert_eq!(vector, vec![1.0, 0.0, 0.1]);

    let requests = server.received_requests().await.expect("recording is on");
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request body is JSON");
    assert_eq!(body["model"], "test-embedder");
    assert_eq!(body["dimensions"], 3);
    assert_eq!(body["encoding_format"], "float");
}
