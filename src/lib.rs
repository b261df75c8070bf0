//! vox-agent: orchestration core for a tool-using voice assistant.
//!
//! A turn takes recognized user text, narrows an aggregated catalog of
//! MCP-provided tools down to the few most relevant ones, and runs a bounded
//! model/tool loop until the model produces a text answer. Conversation
//! history is kept within a turn and age window, optionally folding evicted
//! messages into a single summary.
//!
//! # Quick Start
//!
//! ```no_run
//! use vox_agent::agent::VoiceAgent;
//! use vox_agent::config::AppConfig;
//!
//! # async fn example() -> vox_agent::error::Result<()> {
//! let config = AppConfig::load(None)?;
//! let mut agent = VoiceAgent::start(&config).await?;
//! let reply = agent.process("turn the lights on").await?;
//! println!("{reply}");
//! agent.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod mcp;
pub mod prompt;
pub mod provider;
pub mod ranking;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Result, VoxError};
