//! Configuration loaded from a TOML file with environment placeholders.
//!
//! Every component receives its own section at construction; nothing reads a
//! process-wide config object.

pub mod env;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::VoxError;
use crate::mcp::transport::TransportConfig;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub context: ContextConfig,
    pub tool_selection: ToolSelectionConfig,
    pub embedding: EmbeddingConfig,
    /// Base instruction installed at position 0 of the conversation.
    pub system_prompt: String,
    pub mcp_servers: ServersConfig,
    /// Legacy single-server form, registered as `default`.
    pub mcp_server: Option<TransportConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Upper bound on model calls within one turn.
    pub max_iterations: usize,
    pub request_timeout_secs: u64,
    /// Repeats of a failed model call on rate limits, server or network errors.
    pub max_retries: u32,
    /// Delay before the first repeat; doubles on each further one.
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_iterations: 10,
            request_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_turns: usize,
    pub max_time_seconds: u64,
    pub enable_summarization: bool,
    pub summary_role: SummaryRole,
    pub summarization: SummarizationConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: 3,
            max_time_seconds: 30 * 60,
            enable_summarization: false,
            summary_role: SummaryRole::User,
            summarization: SummarizationConfig::default(),
        }
    }
}

/// Role under which a summary message is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SummaryRole {
    #[default]
    User,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Model used for summaries; falls back to `llm.model`.
    pub model: Option<String>,
    pub max_summary_tokens: usize,
    /// Instruction template; `{max_tokens}` is substituted.
    pub summary_prompt: String,
    pub timeout_secs: u64,
    /// Characters kept per message by the local fallback reducer.
    pub fallback_chars: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_summary_tokens: 200,
            summary_prompt: "Summarize the following conversation history concisely, keeping \
                             key facts and user intents. Use at most {max_tokens} tokens:"
                .into(),
            timeout_secs: 15,
            fallback_chars: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSelectionConfig {
    pub top_k: usize,
    pub backend: RankerBackend,
}

impl Default for ToolSelectionConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            backend: RankerBackend::Lexical,
        }
    }
}

/// Scoring method used to narrow the tool catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RankerBackend {
    #[default]
    Lexical,
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "https://api.siliconflow.cn/v1/embeddings".into(),
            model: "BAAI/bge-m3".into(),
            api_key: String::new(),
            dimensions: 1024,
            timeout_secs: 10,
            cache_capacity: 256,
        }
    }
}

/// Tool servers, either as a table keyed by name or as a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServersConfig {
    Named(IndexMap<String, TransportConfig>),
    List(Vec<ListedServer>),
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self::Named(IndexMap::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedServer {
    pub name: Option<String>,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

impl AppConfig {
    /// Load, resolve placeholders and validate.
    ///
    /// `.env` is loaded first when present. Without an explicit path the
    /// working directory and then the platform config directory are tried.
    pub fn load(path: Option<&Path>) -> Result<Self, VoxError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path().ok_or_else(|| {
                VoxError::Configuration(format!(
                    "no {DEFAULT_CONFIG_FILE} in the working directory or the user config directory"
                ))
            })?,
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            VoxError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text, &env::process_env)?;
        config.validate()?;
        tracing::info!(path = %path.display(), servers = config.servers().len(), "configuration loaded");
        Ok(config)
    }

    /// Parse TOML text, resolving `${VAR:default}` placeholders through `lookup`.
    pub fn from_toml_str(
        text: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, VoxError> {
        let table: toml::Table = toml::from_str(text)
            .map_err(|e| VoxError::Configuration(format!("invalid TOML: {e}")))?;
        let resolved = env::resolve_placeholders(toml::Value::Table(table), lookup);
        resolved
            .try_into::<AppConfig>()
            .map_err(|e| VoxError::Configuration(format!("invalid configuration: {e}")))
    }

    /// Tool servers in registration order.
    ///
    /// Table entries keep the order they appear in the file; list entries
    /// default to `server_{index}` when unnamed.
    pub fn servers(&self) -> Vec<(String, TransportConfig)> {
        let mut servers: Vec<(String, TransportConfig)> = match &self.mcp_servers {
            ServersConfig::Named(map) => map
                .iter()
                .map(|(name, transport)| (name.clone(), transport.clone()))
                .collect(),
            ServersConfig::List(list) => list
                .iter()
                .enumerate()
                .map(|(i, server)| {
                    let name = server
                        .name
                        .clone()
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| format!("server_{i}"));
                    (name, server.transport.clone())
                })
                .collect(),
        };

        if servers.is_empty() {
            if let Some(legacy) = &self.mcp_server {
                servers.push(("default".into(), legacy.clone()));
            }
        }
        servers
    }

    /// Reject configurations that cannot start a session.
    pub fn validate(&self) -> Result<(), VoxError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(VoxError::Configuration("llm.api_key is required".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(VoxError::Configuration("llm.model is required".into()));
        }
        if self.llm.max_iterations == 0 {
            return Err(VoxError::Configuration("llm.max_iterations must be at least 1".into()));
        }
        if self.tool_selection.top_k == 0 {
            return Err(VoxError::Configuration("tool_selection.top_k must be at least 1".into()));
        }
        if self.context.max_turns == 0 {
            return Err(VoxError::Configuration("context.max_turns must be at least 1".into()));
        }
        if self.tool_selection.backend == RankerBackend::Semantic {
            if self.embedding.api_key.trim().is_empty() {
                return Err(VoxError::Configuration(
                    "embedding.api_key is required for the semantic backend".into(),
                ));
            }
            if self.embedding.dimensions == 0 {
                return Err(VoxError::Configuration(
                    "embedding.dimensions must be positive".into(),
                ));
            }
        }
        for (name, transport) in self.servers() {
            transport.validate(&name)?;
        }
        Ok(())
    }
}

/// `./config.toml` if present, otherwise the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    directories::ProjectDirs::from("", "", "vox-agent")
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
        .filter(|path| path.is_file())
}
