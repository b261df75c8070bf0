//! Core types shared across the agent.

pub mod message;

pub use message::{Message, Role, ToolCallRequest};
