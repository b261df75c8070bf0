//! Embedding-based scoring over synthesized tool descriptions.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;

use crate::tools::ToolCatalogEntry;
use crate::util::cache::{CacheStats, LruCache};

use super::embedding::{dot, normalize, EmbeddingClient};
use super::lexical::name_bonus;

/// Query embeddings are cached under this many leading characters.
pub const QUERY_CACHE_KEY_CHARS: usize = 200;

/// Text embedded for one tool.
pub fn tool_description(entry: &ToolCatalogEntry) -> String {
    let mut lines = vec![
        format!("Tool name: {}", entry.native_name),
        format!("Tool description: {}", entry.description),
    ];
    let params = entry.parameters();
    if !params.is_empty() {
        let rendered: Vec<String> = params
            .iter()
            .map(|p| format!("{}({}): {}", p.name, p.kind, p.description))
            .collect();
        lines.push(format!("Parameters: {}", rendered.join(", ")));
    }
    lines.push(format!("Provider: {}", entry.provider_name));
    lines.join("\n")
}

fn cache_key(query: &str) -> String {
    query.chars().take(QUERY_CACHE_KEY_CHARS).collect()
}

/// Unit vectors for every tool that embedded successfully.
pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingClient>,
    vectors: HashMap<String, Vec<f32>>,
    query_cache: LruCache<Vec<f32>>,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, cache_capacity: usize) -> Self {
        Self {
            embedder,
            vectors: HashMap::new(),
            query_cache: LruCache::new(cache_capacity),
        }
    }

    pub fn model(&self) -> &str {
        self.embedder.model()
    }

    /// Replace the stored vectors. Tools whose embedding fails are left out.
    pub async fn build(&mut self, entries: &[ToolCatalogEntry]) {
        let embedder = &self.embedder;
        let results = join_all(entries.iter().map(|entry| async move {
            let text = tool_description(entry);
            (entry.unique_id.clone(), embedder.embed(&text).await)
        }))
        .await;

        self.vectors.clear();
        for (unique_id, result) in results {
            match result {
                Ok(mut vector) => {
                    if normalize(&mut vector) {
                        self.vectors.insert(unique_id, vector);
                    } else {
                        tracing::warn!(tool = %unique_id, "embedding was all zeros; tool has no vector");
                    }
                }
                Err(error) => {
                    tracing::warn!(tool = %unique_id, %error, "tool embedding failed");
                }
            }
        }
        tracing::info!(
            tools = entries.len(),
            vectors = self.vectors.len(),
            "semantic index built"
        );
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn cached_queries(&self) -> usize {
        self.query_cache.len()
    }

    pub fn query_cache_stats(&self) -> CacheStats {
        self.query_cache.stats()
    }

    /// Unit query vector, or None when the backend fails or returns zeros.
    pub async fn query_vector(&self, query: &str) -> Option<Vec<f32>> {
        let key = cache_key(query);
        if let Some(vector) = self.query_cache.get(&key) {
            return Some(vector);
        }

        let mut vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(%error, "query embedding failed");
                return None;
            }
        };
        if !normalize(&mut vector) {
            return None;
        }
        self.query_cache.insert(key, vector.clone());
        Some(vector)
    }

    /// Dot product plus name bonus for every entry, in catalog order.
    pub fn score(
        &self,
        query_vector: &[f32],
        query: &str,
        query_tokens: &[String],
        entries: &[ToolCatalogEntry],
    ) -> Vec<f64> {
        entries
            .iter()
            .map(|entry| {
                let similarity = self
                    .vectors
                    .get(&entry.unique_id)
                    .map(|v| dot(query_vector, v))
                    .unwrap_or(0.0);
                similarity + name_bonus(query, query_tokens, &entry.native_name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct KeywordEmbedder {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        fn model(&self) -> &str {
            "keyword"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, VoxError> {
            self.calls
                .lock()
                .expect("embedder call log lock")
                .push(text.to_string());
            let lower = text.to_lowercase();
            if lower.contains("broken") {
                return Err(VoxError::RankingBackend("boom".into()));
            }
            Ok(vec![
                if lower.contains("light") { 1.0 } else { 0.0 },
                if lower.contains("weather") { 1.0 } else { 0.0 },
            ])
        }
    }

    fn entry(native: &str, description: &str) -> ToolCatalogEntry {
        ToolCatalogEntry {
            unique_id: format!("home:{native}"),
            provider_name: "home".into(),
            native_name: native.into(),
            description: description.into(),
            parameter_schema: json!({
                "type": "object",
                "properties": { "room": { "type": "string", "description": "Room name" } }
            }),
            provider_metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn description_lists_parameters_and_provider() {
        let text = tool_description(&entry("lights_on", "Turn on lights"));
        assert_eq!(
            text,
            "Tool name: lights_on\nTool description: Turn on lights\nParameters: room(string): Room name\nProvider: home"
        );
    }

    #[tokio::test]
    async fn failed_and_zero_embeddings_are_left_out() {
        let embedder = Arc::new(KeywordEmbedder {
            calls: StdMutex::new(Vec::new()),
        });
        let mut index = SemanticIndex::new(embedder, 8);
        index
            .build(&[
                entry("lights_on", "Turn on lights"),
                entry("broken", "Always fails"),
                entry("timer", "Start a timer"),
            ])
            .await;
        assert_eq!(index.vector_count(), 1);
    }

    #[tokio::test]
    async fn query_vectors_are_cached_by_prefix() {
        let embedder = Arc::new(KeywordEmbedder {
            calls: StdMutex::new(Vec::new()),
        });
        let index = SemanticIndex::new(embedder.clone(), 8);
        let long_query = format!("lights {}", "x".repeat(300));
        let first = index.query_vector(&long_query).await;
        let second = index.query_vector(&format!("{long_query}different tail")).await;
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(embedder.calls.lock().expect("call log lock").len(), 1);
        assert_eq!(index.cached_queries(), 1);
        let stats = index.query_cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn zero_query_vector_is_none() {
        let embedder = Arc::new(KeywordEmbedder {
            calls: StdMutex::new(Vec::new()),
        });
        let index = SemanticIndex::new(embedder, 8);
        assert!(index.query_vector("play some music").await.is_none());
        assert_eq!(index.cached_queries(), 0);
    }
}
