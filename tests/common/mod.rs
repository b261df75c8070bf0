//! Shared test helpers: a scripted completion client and in-memory tool providers.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use vox_agent::config::AppConfig;
use vox_agent::error::VoxError;
use vox_agent::mcp::{
    MCPPromptSchema, MCPToolSchema, ProviderConnector, ProviderSession, ToolCallOutput,
    ToolContent, TransportConfig,
};
use vox_agent::provider::{CompletionClient, CompletionRequest, CompletionResponse};
use vox_agent::types::ToolCallRequest;

/// A completion client that replays queued responses and records requests.
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: Mutex<Vec<Result<CompletionResponse, VoxError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_text(&self, text: &str) -> &Self {
        self.push(Ok(CompletionResponse::text(text)))
    }

    pub fn queue_tool_call(&self, id: &str, name: &str, arguments: &str) -> &Self {
        self.push(Ok(CompletionResponse::tool_calls(vec![ToolCallRequest::new(
            id, name, arguments,
        )])))
    }

    pub fn queue_tool_calls(&self, calls: Vec<ToolCallRequest>) -> &Self {
        self.push(Ok(CompletionResponse::tool_calls(calls)))
    }

    pub fn queue_error(&self, error: VoxError) -> &Self {
        self.push(Err(error))
    }

    fn push(&self, response: Result<CompletionResponse, VoxError>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(response);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, VoxError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        if responses.is_empty() {
            return Ok(CompletionResponse::text("(no scripted response)"));
        }
        responses.remove(0)
    }
}

/// What one in-memory provider exposes.
#[derive(Clone, Default)]
pub struct FakeProvider {
    pub tools: Vec<MCPToolSchema>,
    pub prompts: Vec<MCPPromptSchema>,
    pub instructions: Option<String>,
    pub fail_connect: bool,
    /// Canned results by native tool name; unknown names fail.
    pub results: HashMap<String, Result<ToolCallOutput, String>>,
}

impl FakeProvider {
    pub fn with_tool(mut self, name: &str, description: &str, result: &str) -> Self {
        self.tools.push(tool_schema(name, description));
        self.results
            .insert(name.to_string(), Ok(ToolCallOutput::text(result)));
        self
    }

    pub fn with_failing_tool(mut self, name: &str, description: &str, message: &str) -> Self {
        self.tools.push(tool_schema(name, description));
        self.results.insert(name.to_string(), Err(message.to_string()));
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }
}

pub fn tool_schema(name: &str, description: &str) -> MCPToolSchema {
    MCPToolSchema {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: json!({
            "type": "object",
            "properties": { "room": { "type": "string", "description": "Room name" } }
        }),
    }
}

/// Recorded tool invocation: provider, native name, arguments.
pub type CallLog = Arc<Mutex<Vec<(String, String, serde_json::Value)>>>;

/// Connects provider names to [`FakeProvider`] definitions.
#[derive(Default)]
pub struct InMemoryConnector {
    providers: HashMap<String, FakeProvider>,
    pub calls: CallLog,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, name: &str, provider: FakeProvider) -> Self {
        self.providers.insert(name.to_string(), provider);
        self
    }

    pub fn calls(&self) -> Vec<(String, String, serde_json::Value)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

struct InMemorySession {
    name: String,
    provider: FakeProvider,
    calls: CallLog,
}

#[async_trait]
impl ProviderSession for InMemorySession {
    async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, VoxError> {
        Ok(self.provider.tools.clone())
    }

    async fn list_prompts(&mut self) -> Result<Vec<MCPPromptSchema>, VoxError> {
        Ok(self.provider.prompts.clone())
    }

    fn instructions(&self) -> Option<String> {
        self.provider.instructions.clone()
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, VoxError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((self.name.clone(), name.to_string(), arguments));
        match self.provider.results.get(name) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(VoxError::ToolExecution {
                tool_name: name.to_string(),
                message: message.clone(),
            }),
            None => Err(VoxError::ToolExecution {
                tool_name: name.to_string(),
                message: "no such tool".into(),
            }),
        }
    }

    async fn get_prompt(
        &mut self,
        name: &str,
        _arguments: BTreeMap<String, String>,
    ) -> Result<Vec<ToolContent>, VoxError> {
        Ok(vec![ToolContent::Text(format!("{name} from {}", self.name))])
    }

    async fn close(&mut self) -> Result<(), VoxError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderConnector for InMemoryConnector {
    async fn connect(
        &self,
        provider: &str,
        _transport: &TransportConfig,
    ) -> Result<Box<dyn ProviderSession>, VoxError> {
        let definition = self.providers.get(provider).cloned().ok_or_else(|| {
            VoxError::ProviderConnection {
                provider: provider.to_string(),
                message: "unknown provider".into(),
            }
        })?;
        if definition.fail_connect {
            return Err(VoxError::ProviderConnection {
                provider: provider.to_string(),
                message: "connection refused".into(),
            });
        }
        Ok(Box::new(InMemorySession {
            name: provider.to_string(),
            provider: definition,
            calls: Arc::clone(&self.calls),
        }))
    }
}

/// Config with the given servers declared as HTTP endpoints.
pub fn config_with_servers(servers: &[&str]) -> AppConfig {
    let mut text = String::from(
        r#"
system_prompt = "You are a helpful voice assistant."

[llm]
api_key = "sk-test"
model = "gpt-4o-mini"
max_iterations = 4

[tool_selection]
top_k = 2
"#,
    );
    for server in servers {
        text.push_str(&format!(
            "\n[mcp_servers.{server}]\ntype = \"http\"\nurl = \"http://{server}.local/mcp\"\n"
        ));
    }
    AppConfig::from_toml_str(&text, &|_| None).expect("test config should parse")
}
