//! Narrowing the tool catalog to the few entries most relevant to a query.

pub mod embedding;
pub mod lexical;
pub mod semantic;

use std::sync::Arc;

use serde::Serialize;

use crate::config::{EmbeddingConfig, RankerBackend, ToolSelectionConfig};
use crate::error::VoxError;
use crate::tools::ToolCatalogEntry;

pub use embedding::{EmbeddingClient, HttpEmbeddingClient};
pub use lexical::LexicalIndex;
pub use semantic::SemanticIndex;

/// A catalog entry with the score it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTool {
    pub entry: ToolCatalogEntry,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankerStats {
    pub backend: RankerBackend,
    pub top_k: usize,
    pub indexed_tools: usize,
    pub tool_vectors: usize,
    pub cached_queries: usize,
    pub query_cache_hits: u64,
    pub query_cache_misses: u64,
    pub embedding_model: Option<String>,
}

/// Ranks catalog entries against user text.
///
/// The lexical index is always built so the semantic backend can fall back
/// to it per call.
pub struct ToolRanker {
    top_k: usize,
    entries: Vec<ToolCatalogEntry>,
    lexical: LexicalIndex,
    semantic: Option<SemanticIndex>,
}

impl ToolRanker {
    pub fn lexical(top_k: usize) -> Self {
        Self {
            top_k,
            entries: Vec::new(),
            lexical: LexicalIndex::default(),
            semantic: None,
        }
    }

    pub fn semantic(top_k: usize, embedder: Arc<dyn EmbeddingClient>, cache_capacity: usize) -> Self {
        Self {
            semantic: Some(SemanticIndex::new(embedder, cache_capacity)),
            ..Self::lexical(top_k)
        }
    }

    pub fn from_config(
        selection: &ToolSelectionConfig,
        embedding: &EmbeddingConfig,
    ) -> Result<Self, VoxError> {
        Ok(match selection.backend {
            RankerBackend::Lexical => Self::lexical(selection.top_k),
            RankerBackend::Semantic => Self::semantic(
                selection.top_k,
                Arc::new(HttpEmbeddingClient::from_config(embedding)?),
                embedding.cache_capacity,
            ),
        })
    }

    pub fn backend(&self) -> RankerBackend {
        if self.semantic.is_some() {
            RankerBackend::Semantic
        } else {
            RankerBackend::Lexical
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Replace the index with one built over `catalog`.
    pub async fn build_index(&mut self, catalog: &[ToolCatalogEntry]) {
        self.entries = catalog.to_vec();
        self.lexical = LexicalIndex::build(&self.entries);
        if let Some(semantic) = self.semantic.as_mut() {
            semantic.build(&self.entries).await;
        }
        tracing::debug!(tools = self.entries.len(), backend = %self.backend(), "ranker index built");
    }

    /// At most `top_k` entries, best first.
    pub async fn rank(&self, query: &str) -> Vec<ToolCatalogEntry> {
        self.rank_with_scores(query)
            .await
            .into_iter()
            .map(|scored| scored.entry)
            .collect()
    }

    /// Like [`rank`](Self::rank), keeping scores. Ties keep catalog order.
    pub async fn rank_with_scores(&self, query: &str) -> Vec<ScoredTool> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let tokens = lexical::tokenize(query);
        if tokens.is_empty() {
            return self
                .entries
                .iter()
                .take(self.top_k)
                .map(|entry| ScoredTool {
                    entry: entry.clone(),
                    score: 0.0,
                })
                .collect();
        }

        let scores = match self.semantic_scores(query, &tokens).await {
            Some(scores) => scores,
            None => self.lexical.score(query, &tokens, &self.entries),
        };

        let mut scored: Vec<ScoredTool> = self
            .entries
            .iter()
            .zip(scores)
            .map(|(entry, score)| ScoredTool {
                entry: entry.clone(),
                score,
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.top_k);

        if let Some(best) = scored.first() {
            tracing::debug!(tool = %best.entry.unique_id, score = best.score, "top ranked tool");
        }
        scored
    }

    async fn semantic_scores(&self, query: &str, tokens: &[String]) -> Option<Vec<f64>> {
        let semantic = self.semantic.as_ref()?;
        if semantic.vector_count() == 0 {
            tracing::warn!("no tool vectors indexed; using lexical ranking");
            return None;
        }
        let Some(query_vector) = semantic.query_vector(query).await else {
            tracing::warn!("query embedding unavailable; using lexical ranking");
            return None;
        };
        Some(semantic.score(&query_vector, query, tokens, &self.entries))
    }

    pub fn stats(&self) -> RankerStats {
        let cache = self
            .semantic
            .as_ref()
            .map(|s| s.query_cache_stats())
            .unwrap_or_default();
        RankerStats {
            backend: self.backend(),
            top_k: self.top_k,
            indexed_tools: self.entries.len(),
            tool_vectors: self.semantic.as_ref().map_or(0, |s| s.vector_count()),
            cached_queries: cache.entries,
            query_cache_hits: cache.hits,
            query_cache_misses: cache.misses,
            embedding_model: self.semantic.as_ref().map(|s| s.model().to_string()),
        }
    }
}
