//! Term-frequency cosine scoring.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::tools::ToolCatalogEntry;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Bonus when the whole query appears in the native tool name.
pub const FULL_NAME_BONUS: f64 = 0.3;
/// Bonus when any query token appears in the native tool name.
pub const PARTIAL_NAME_BONUS: f64 = 0.1;

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s]").expect("punctuation regex must compile"))
}

/// Lowercase, replace punctuation with spaces, split and drop stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    punctuation()
        .replace_all(&lowered, " ")
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Relative term frequencies; empty input gives an empty vector.
pub fn term_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_default() += 1.0;
    }
    let total = tokens.len() as f64;
    counts.values_mut().for_each(|count| *count /= total);
    counts
}

pub fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(word, x)| b.get(word).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Name-match bonus shared by both scoring backends.
pub fn name_bonus(query: &str, query_tokens: &[String], native_name: &str) -> f64 {
    let name = native_name.to_lowercase();
    if name.contains(&query.to_lowercase()) {
        FULL_NAME_BONUS
    } else if query_tokens.iter().any(|token| name.contains(token.as_str())) {
        PARTIAL_NAME_BONUS
    } else {
        0.0
    }
}

/// Term-frequency vectors over `unique_id + description`, one per catalog entry.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    documents: Vec<HashMap<String, f64>>,
}

impl LexicalIndex {
    pub fn build(entries: &[ToolCatalogEntry]) -> Self {
        let documents = entries
            .iter()
            .map(|entry| {
                let tokens = tokenize(&format!("{} {}", entry.unique_id, entry.description));
                term_frequencies(&tokens)
            })
            .collect();
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Score every entry against the query, in index order.
    pub fn score(&self, query: &str, query_tokens: &[String], entries: &[ToolCatalogEntry]) -> Vec<f64> {
        let query_tf = term_frequencies(query_tokens);
        entries
            .iter()
            .zip(&self.documents)
            .map(|(entry, document)| {
                cosine_similarity(&query_tf, document)
                    + name_bonus(query, query_tokens, &entry.native_name)
            })
            .collect()
    }
}
