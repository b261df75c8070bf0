//! A running assistant: registry, ranker, prompts and conversation wired together.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::context::{ContextStats, ConversationStore, Summarizer};
use crate::error::VoxError;
use crate::mcp::{RegistryStats, ToolRegistry};
use crate::prompt::{PromptAssembler, PromptStats};
use crate::provider::CompletionClient;
use crate::ranking::{RankerStats, ToolRanker};
use crate::types::Message;

use super::turn::{AgentStats, TurnProcessor, TurnSettings};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub agent: AgentStats,
    pub context: ContextStats,
    pub registry: RegistryStats,
    pub ranker: RankerStats,
    pub prompts: PromptStats,
}

pub struct VoiceAgent {
    registry: ToolRegistry,
    ranker: ToolRanker,
    assembler: PromptAssembler,
    processor: TurnProcessor,
}

impl VoiceAgent {
    /// Start against real MCP servers and an OpenAI-compatible model.
    #[cfg(feature = "mcp")]
    pub async fn start(config: &AppConfig) -> Result<Self, VoxError> {
        let completion = Arc::new(crate::provider::OpenAiChatClient::from_config(&config.llm)?);
        let ranker = ToolRanker::from_config(&config.tool_selection, &config.embedding)?;
        Self::start_with(config, completion, ToolRegistry::with_mcp(), ranker).await
    }

    /// Start with injected collaborators.
    ///
    /// Connects every configured server, indexes the merged catalog and
    /// installs the assembled base instruction.
    pub async fn start_with(
        config: &AppConfig,
        completion: Arc<dyn CompletionClient>,
        mut registry: ToolRegistry,
        mut ranker: ToolRanker,
    ) -> Result<Self, VoxError> {
        let servers = config.servers();
        let requested = servers.len();
        let connected = registry.add_providers(servers).await;
        if connected < requested {
            tracing::warn!(connected, requested, "some tool providers are unavailable");
        }

        ranker.build_index(registry.all_tools()).await;

        let mut assembler = PromptAssembler::new(config.system_prompt.clone());
        assembler.set_discovered(registry.all_prompts().to_vec());
        assembler.set_instruction_sources(registry.instruction_sources());

        let summary_model = config
            .context
            .summarization
            .model
            .clone()
            .unwrap_or_else(|| config.llm.model.clone());
        let summarizer = Summarizer::new(
            Some(Arc::clone(&completion)),
            summary_model,
            config.context.summarization.clone(),
        );
        let store = ConversationStore::with_summarizer(&config.context, summarizer);
        let processor = TurnProcessor::new(completion, TurnSettings::from(&config.llm), store);

        let mut agent = Self {
            registry,
            ranker,
            assembler,
            processor,
        };
        agent.refresh_base_instruction().await;

        tracing::info!(
            providers = connected,
            tools = agent.registry.all_tools().len(),
            prompts = agent.registry.all_prompts().len(),
            backend = %agent.ranker.backend(),
            "voice agent started"
        );
        Ok(agent)
    }

    /// Handle one utterance.
    pub async fn process(&mut self, input: &str) -> Result<String, VoxError> {
        self.processor
            .process(input, &self.registry, &self.ranker)
            .await
    }

    /// Load a discovered prompt into the base instruction.
    pub async fn load_prompt(
        &mut self,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Option<String> {
        let content = self
            .assembler
            .load_prompt(name, &self.registry, arguments)
            .await?;
        self.refresh_base_instruction().await;
        Some(content)
    }

    pub async fn add_custom_prompt(&mut self, name: &str, content: &str) {
        self.assembler.add_custom_prompt(name, content);
        self.refresh_base_instruction().await;
    }

    async fn refresh_base_instruction(&mut self) {
        let text = self.assembler.combined_instructions(true);
        if !text.trim().is_empty() {
            self.processor
                .store_mut()
                .set_base(Message::system(text))
                .await;
        }
    }

    /// Forget the conversation, keeping the base instruction.
    pub fn reset_conversation(&mut self) {
        self.processor.store_mut().reset(true);
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn ranker(&self) -> &ToolRanker {
        &self.ranker
    }

    pub fn store(&self) -> &ConversationStore {
        self.processor.store()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            agent: self.processor.stats(),
            context: self.processor.store().stats(),
            registry: self.registry.stats(),
            ranker: self.ranker.stats(),
            prompts: self.assembler.stats(),
        }
    }

    /// Close every provider channel. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.registry.shutdown().await;
        tracing::info!("voice agent stopped");
    }
}
