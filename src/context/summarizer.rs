//! Condensing evicted history into a single summary.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SummarizationConfig;
use crate::error::VoxError;
use crate::provider::{CompletionClient, CompletionRequest};
use crate::types::Message;
use crate::util::timeout::with_timeout;

/// Roughly four characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Produces summary bodies. Never fails; the local reducer is the last resort.
pub struct Summarizer {
    client: Option<Arc<dyn CompletionClient>>,
    model: String,
    config: SummarizationConfig,
}

impl Summarizer {
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        model: impl Into<String>,
        config: SummarizationConfig,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            config,
        }
    }

    /// A summarizer with no model behind it.
    pub fn local(config: SummarizationConfig) -> Self {
        Self::new(None, String::new(), config)
    }

    pub fn budget_chars(&self) -> usize {
        self.config.max_summary_tokens * CHARS_PER_TOKEN
    }

    /// Summary body for the given messages, within the character budget.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        let summary = match self.summarize_remote(messages).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(%error, evicted = messages.len(), "summarization fell back to local reducer");
                fallback_reduce(messages, self.config.fallback_chars)
            }
        };
        truncate_chars(&summary, self.budget_chars())
    }

    async fn summarize_remote(&self, messages: &[Message]) -> Result<String, VoxError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| VoxError::Summarization("no completion client configured".into()))?;

        let instruction = self
            .config
            .summary_prompt
            .replace("{max_tokens}", &self.config.max_summary_tokens.to_string());
        let request = CompletionRequest::builder()
            .model(self.model.clone())
            .messages(vec![Message::user(format!(
                "{instruction}\n\n{}",
                render_transcript(messages)
            ))])
            .temperature(0.3)
            .max_tokens(self.config.max_summary_tokens as u32)
            .build();

        let response = with_timeout(
            Duration::from_secs(self.config.timeout_secs),
            client.complete(&request),
        )
        .await
        .map_err(|e| VoxError::Summarization(e.to_string()))?;

        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| VoxError::Summarization("empty summary response".into()))
    }
}

/// `role: content` lines, one per message.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role(), message_text(message)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn message_text(message: &Message) -> String {
    match message.content() {
        Some(content) if !content.is_empty() => content.to_string(),
        _ => {
            let names: Vec<&str> = message
                .tool_calls()
                .iter()
                .map(|call| call.name.as_str())
                .collect();
            if names.is_empty() {
                String::new()
            } else {
                format!("[called {}]", names.join(", "))
            }
        }
    }
}

/// First `chars_per_message` characters of each message, joined by `; `.
pub fn fallback_reduce(messages: &[Message], chars_per_message: usize) -> String {
    messages
        .iter()
        .map(|message| {
            format!(
                "{}: {}",
                message.role(),
                truncate_chars(&message_text(message), chars_per_message)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Last `max_chars` characters of `text`.
pub fn tail_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    match text.char_indices().nth(total - max_chars) {
        Some((idx, _)) => text[idx..].to_string(),
        None => String::new(),
    }
}
