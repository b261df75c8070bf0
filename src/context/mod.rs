//! Conversation context: bounded history and summarization of what falls out of it.

pub mod store;
pub mod summarizer;

pub use store::{ContextStats, ConversationStore, TimestampedMessage, SUMMARY_PREFIX};
pub use summarizer::Summarizer;
