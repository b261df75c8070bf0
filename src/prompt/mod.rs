//! Assembly of the base instruction from configuration and discovered prompts.

pub mod instructions;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::mcp::{InstructionSource, PromptDescriptor, ToolRegistry};

/// Provider name recorded for prompts added locally.
pub const CUSTOM_PROVIDER: &str = "custom";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptStats {
    pub base_instruction_chars: usize,
    pub discovered_prompts: usize,
    pub loaded_prompts: usize,
    pub instruction_sources: usize,
    pub prompt_names: Vec<String>,
}

/// Builds the text installed as the conversation's base message.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    base_instruction: String,
    discovered: Vec<PromptDescriptor>,
    instruction_sources: Vec<InstructionSource>,
    loaded: Vec<(String, String)>,
    /// Arguments each loaded prompt was rendered with.
    loaded_arguments: BTreeMap<String, BTreeMap<String, String>>,
}

impl PromptAssembler {
    pub fn new(base_instruction: impl Into<String>) -> Self {
        Self {
            base_instruction: base_instruction.into(),
            ..Default::default()
        }
    }

    pub fn base_instruction(&self) -> &str {
        &self.base_instruction
    }

    /// Replace the discovered prompt list, keeping custom prompts.
    pub fn set_discovered(&mut self, prompts: Vec<PromptDescriptor>) {
        self.discovered.retain(|p| p.provider == CUSTOM_PROVIDER);
        self.discovered.extend(prompts);
    }

    pub fn set_instruction_sources(&mut self, sources: Vec<InstructionSource>) {
        self.instruction_sources = sources;
    }

    pub fn discovered(&self) -> &[PromptDescriptor] {
        &self.discovered
    }

    /// Register a locally-defined prompt that is already loaded.
    pub fn add_custom_prompt(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        self.discovered.retain(|p| !(p.provider == CUSTOM_PROVIDER && p.name == name));
        self.discovered.push(PromptDescriptor {
            name: name.clone(),
            provider: CUSTOM_PROVIDER.into(),
            description: String::new(),
            arguments: Vec::new(),
        });
        self.store_loaded(name, BTreeMap::new(), content.into());
    }

    pub fn loaded_prompt(&self, name: &str) -> Option<&str> {
        self.loaded
            .iter()
            .find(|(loaded, _)| loaded == name)
            .map(|(_, content)| content.as_str())
    }

    /// Fetch a prompt's content through the registry, caching non-empty results.
    ///
    /// The cache is keyed by name and arguments. Loading a prompt again with
    /// different arguments fetches it anew and replaces the earlier content.
    pub async fn load_prompt(
        &mut self,
        name: &str,
        registry: &ToolRegistry,
        arguments: BTreeMap<String, String>,
    ) -> Option<String> {
        if self.loaded_arguments.get(name) == Some(&arguments) {
            if let Some(cached) = self.loaded_prompt(name) {
                return Some(cached.to_string());
            }
        }

        let content = registry.fetch_prompt(name, None, arguments.clone()).await?;
        if !content.is_empty() {
            self.store_loaded(name.to_string(), arguments, content.clone());
        }
        Some(content)
    }

    fn store_loaded(&mut self, name: String, arguments: BTreeMap<String, String>, content: String) {
        self.loaded_arguments.insert(name.clone(), arguments);
        match self.loaded.iter_mut().find(|(loaded, _)| *loaded == name) {
            Some(entry) => entry.1 = content,
            None => self.loaded.push((name, content)),
        }
    }

    /// Base instruction, optionally followed by discovered prompt context.
    pub fn combined_instructions(&self, include_discovered: bool) -> String {
        if !include_discovered {
            return self.base_instruction.clone();
        }

        let sections: Vec<String> = [
            Some(self.base_instruction.clone()).filter(|base| !base.trim().is_empty()),
            instructions::render_prompt_listing(&self.discovered),
            instructions::render_loaded_prompts(&self.loaded),
            instructions::render_instruction_block(&self.instruction_sources),
        ]
        .into_iter()
        .flatten()
        .collect();

        sections.join("\n\n")
    }

    pub fn stats(&self) -> PromptStats {
        PromptStats {
            base_instruction_chars: self.base_instruction.chars().count(),
            discovered_prompts: self.discovered.len(),
            loaded_prompts: self.loaded.len(),
            instruction_sources: self.instruction_sources.len(),
            prompt_names: self.discovered.iter().map(|p| p.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxError;
    use crate::mcp::{
        MCPPromptSchema, MCPToolSchema, ProviderConnector, ProviderSession, ToolCallOutput,
        ToolContent, TransportConfig,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct PromptSession {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderSession for PromptSession {
        async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, VoxError> {
            Ok(Vec::new())
        }

        async fn list_prompts(&mut self) -> Result<Vec<MCPPromptSchema>, VoxError> {
            Ok(vec![MCPPromptSchema {
                name: "briefing".into(),
                description: Some("Morning briefing".into()),
                arguments: Vec::new(),
            }])
        }

        fn instructions(&self) -> Option<String> {
            Some("Prefer metric units.".into())
        }

        async fn call_tool(
            &mut self,
            _name: &str,
            _arguments: serde_json::Value,
        ) -> Result<ToolCallOutput, VoxError> {
            Ok(ToolCallOutput::default())
        }

        async fn get_prompt(
            &mut self,
            name: &str,
            arguments: BTreeMap<String, String>,
        ) -> Result<Vec<ToolContent>, VoxError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let topic = arguments.get("topic").cloned().unwrap_or_default();
            Ok(vec![ToolContent::Text(format!("{name} about {topic}"))])
        }

        async fn close(&mut self) -> Result<(), VoxError> {
            Ok(())
        }
    }

    struct PromptConnector {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderConnector for PromptConnector {
        async fn connect(
            &self,
            _provider: &str,
            _transport: &TransportConfig,
        ) -> Result<Box<dyn ProviderSession>, VoxError> {
            Ok(Box::new(PromptSession {
                fetches: Arc::clone(&self.fetches),
            }))
        }
    }

    #[test]
    fn without_discovery_returns_base_only() {
        let mut assembler = PromptAssembler::new("You are a voice assistant.");
        assembler.add_custom_prompt("style", "Answer in one sentence.");
        assert_eq!(assembler.combined_instructions(false), "You are a voice assistant.");
    }

    #[test]
    fn combined_lists_prompts_then_loaded_content() {
        let mut assembler = PromptAssembler::new("You are a voice assistant.");
        assembler.set_discovered(vec![PromptDescriptor {
            name: "briefing".into(),
            provider: "news".into(),
            description: "Morning briefing".into(),
            arguments: Vec::new(),
        }]);
        assembler.add_custom_prompt("style", "Answer in one sentence.");

        let combined = assembler.combined_instructions(true);
        assert!(combined.starts_with("You are a voice assistant.\n\nAvailable prompts:\n"));
        assert!(combined.contains("- briefing: Morning briefing [provider: news]"));
        assert!(combined.contains("- style [provider: custom]"));
        assert!(combined.contains("Loaded prompts:\n### style:\nAnswer in one sentence."));
        assert_eq!(combined, assembler.combined_instructions(true));
    }

    #[test]
    fn set_discovered_keeps_custom_prompts() {
        let mut assembler = PromptAssembler::new("");
        assembler.add_custom_prompt("style", "Be brief.");
        assembler.set_discovered(Vec::new());
        assert_eq!(assembler.stats().prompt_names, vec!["style"]);
        assert_eq!(assembler.stats().loaded_prompts, 1);
    }

    #[tokio::test]
    async fn load_prompt_caches_per_arguments() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new(Arc::new(PromptConnector {
            fetches: Arc::clone(&fetches),
        }));
        assert!(registry.add_provider("news", TransportConfig::http("http://news")).await);

        let mut assembler = PromptAssembler::new("base");
        assembler.set_discovered(registry.all_prompts().to_vec());
        assembler.set_instruction_sources(registry.instruction_sources());

        let args = BTreeMap::from([("topic".to_string(), "weather".to_string())]);
        let first = assembler.load_prompt("briefing", &registry, args.clone()).await;
        let second = assembler.load_prompt("briefing", &registry, args).await;
        assert_eq!(first.as_deref(), Some("briefing about weather"));
        assert_eq!(first, second);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let other = BTreeMap::from([("topic".to_string(), "traffic".to_string())]);
        let third = assembler.load_prompt("briefing", &registry, other).await;
        assert_eq!(third.as_deref(), Some("briefing about traffic"));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(assembler.stats().loaded_prompts, 1);

        let combined = assembler.combined_instructions(true);
        assert!(combined.contains("### briefing:\nbriefing about traffic"));
        assert!(combined.ends_with("MCP server instructions:\n\n[server:news]\nPrefer metric units."));

        assert!(assembler
            .load_prompt("missing", &registry, BTreeMap::new())
            .await
            .is_none());
    }
}
