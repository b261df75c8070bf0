//! Ordered message history with turn- and age-based retention.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::{ContextConfig, SummaryRole};
use crate::types::{Message, Role};

use super::summarizer::{tail_chars, Summarizer};

/// Prefix carried by every summary message.
pub const SUMMARY_PREFIX: &str = "[Conversation summary] ";

#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedMessage {
    pub message: Message,
    pub created_at: Instant,
    /// Turn the message belongs to; the base and summaries are turn 0.
    pub turn_index: u64,
    pub is_summary: bool,
}

impl TimestampedMessage {
    fn new(message: Message, turn_index: u64) -> Self {
        Self {
            message,
            created_at: Instant::now(),
            turn_index,
            is_summary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub tool_messages: usize,
    pub summary_messages: usize,
    pub current_turn: u64,
    pub oldest_age_seconds: f64,
    pub max_turns: usize,
    pub max_time_seconds: u64,
}

/// Conversation history for one session.
///
/// Layout is always `[base] [summary] recent...`. The base never expires.
/// New summaries are appended to the summary body, which keeps its newest
/// characters once it outgrows the budget.
pub struct ConversationStore {
    max_turns: usize,
    max_age: Duration,
    summary_role: SummaryRole,
    summarizer: Option<Summarizer>,
    base: Option<TimestampedMessage>,
    summary: Option<TimestampedMessage>,
    summary_body: String,
    messages: Vec<TimestampedMessage>,
    current_turn: u64,
}

impl ConversationStore {
    /// Store without summarization regardless of `enable_summarization`.
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            max_age: Duration::from_secs(config.max_time_seconds),
            summary_role: config.summary_role,
            summarizer: None,
            base: None,
            summary: None,
            summary_body: String::new(),
            messages: Vec::new(),
            current_turn: 0,
        }
    }

    /// Store that summarizes evicted messages when `enable_summarization` is set.
    pub fn with_summarizer(config: &ContextConfig, summarizer: Summarizer) -> Self {
        let mut store = Self::new(config);
        if config.enable_summarization {
            store.summarizer = Some(summarizer);
        }
        store
    }

    pub fn current_turn(&self) -> u64 {
        self.current_turn
    }

    /// Append a message and apply retention. A user message opens a new turn.
    pub async fn append(&mut self, message: Message) {
        if message.role() == Role::User {
            self.current_turn += 1;
        }
        self.messages
            .push(TimestampedMessage::new(message, self.current_turn));
        self.apply_retention().await;
    }

    /// Install or replace the base instruction at position 0.
    pub async fn set_base(&mut self, message: Message) {
        self.base = Some(TimestampedMessage::new(message, 0));
        self.apply_retention().await;
    }

    pub fn base(&self) -> Option<&Message> {
        self.base.as_ref().map(|b| &b.message)
    }

    /// Messages in order, ready for a completion call.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries().map(|entry| entry.message.clone()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TimestampedMessage> {
        self.base
            .iter()
            .chain(self.summary.iter())
            .chain(self.messages.iter())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop history and reset the turn counter.
    pub fn reset(&mut self, keep_base: bool) {
        self.messages.clear();
        self.summary = None;
        self.summary_body.clear();
        self.current_turn = 0;
        if !keep_base {
            self.base = None;
        }
    }

    pub fn stats(&self) -> ContextStats {
        let count = |role: Role| {
            self.entries()
                .filter(|e| !e.is_summary && e.message.role() == role)
                .count()
        };
        let oldest_age_seconds = self
            .entries()
            .map(|e| e.created_at.elapsed().as_secs_f64())
            .fold(0.0, f64::max);

        ContextStats {
            total_messages: self.len(),
            user_messages: count(Role::User),
            assistant_messages: count(Role::Assistant),
            tool_messages: count(Role::Tool),
            summary_messages: usize::from(self.summary.is_some()),
            current_turn: self.current_turn,
            oldest_age_seconds,
            max_turns: self.max_turns,
            max_time_seconds: self.max_age.as_secs(),
        }
    }

    async fn apply_retention(&mut self) {
        if self.messages.is_empty() {
            return;
        }

        let now = Instant::now();
        let window_floor = self.current_turn as i64 - self.max_turns as i64;
        let (keep, mut evicted): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.messages)
                .into_iter()
                .partition(|entry| {
                    let in_window = entry.turn_index as i64 > window_floor;
                    let fresh = now.saturating_duration_since(entry.created_at) <= self.max_age;
                    in_window && fresh
                });

        // a tool reply cannot outlive the assistant message that requested it
        let orphaned: HashSet<String> = evicted
            .iter()
            .flat_map(|entry| entry.message.tool_calls())
            .map(|call| call.id.clone())
            .collect();
        let (keep, orphans): (Vec<_>, Vec<_>) = keep.into_iter().partition(|entry| {
            entry
                .message
                .tool_call_id()
                .map_or(true, |id| !orphaned.contains(id))
        });
        evicted.extend(orphans);
        self.messages = keep;

        if evicted.is_empty() {
            return;
        }
        tracing::debug!(
            evicted = evicted.len(),
            kept = self.messages.len(),
            current_turn = self.current_turn,
            "context retention"
        );

        let Some(summarizer) = self.summarizer.as_ref() else {
            return;
        };
        let evicted: Vec<Message> = evicted.into_iter().map(|e| e.message).collect();
        let fresh = summarizer.summarize(&evicted).await;

        let combined = if self.summary_body.is_empty() {
            fresh
        } else {
            format!("{}\n{}", self.summary_body, fresh)
        };
        self.summary_body = tail_chars(&combined, summarizer.budget_chars());

        let text = format!("{SUMMARY_PREFIX}{}", self.summary_body);
        let message = match self.summary_role {
            SummaryRole::User => Message::user(text),
            SummaryRole::System => Message::system(text),
        };
        self.summary = Some(TimestampedMessage {
            message,
            created_at: Instant::now(),
            turn_index: 0,
            is_summary: true,
        });
    }
}
