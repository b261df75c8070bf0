//! Multi-server tool and prompt registry with collision-free routing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::VoxError;
use crate::tools::ToolCatalogEntry;

use super::schema::{
    MCPPromptSchema, MCPToolSchema, PromptDescriptor, ToolCallOutput, ToolContent,
};
use super::transport::TransportConfig;

/// Operations on one open provider channel.
#[async_trait]
pub trait ProviderSession: Send {
    async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, VoxError>;

    /// Prompt listing is optional; servers without prompts return an empty list.
    async fn list_prompts(&mut self) -> Result<Vec<MCPPromptSchema>, VoxError>;

    /// Instructions returned by the server during the handshake.
    fn instructions(&self) -> Option<String>;

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, VoxError>;

    async fn get_prompt(
        &mut self,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<Vec<ToolContent>, VoxError>;

    async fn close(&mut self) -> Result<(), VoxError>;
}

/// Opens provider channels from transport configuration.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(
        &self,
        provider: &str,
        transport: &TransportConfig,
    ) -> Result<Box<dyn ProviderSession>, VoxError>;
}

/// Where a unique tool id dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    pub provider_name: String,
    pub native_name: String,
}

/// One live (or closed) channel to a tool-providing server.
pub struct ProviderConnection {
    pub provider_name: String,
    pub transport_config: TransportConfig,
    pub cached_tools: Vec<MCPToolSchema>,
    pub cached_prompts: Vec<MCPPromptSchema>,
    instructions: Option<String>,
    handle: Mutex<Option<Box<dyn ProviderSession>>>,
}

/// Server instructions with the provider they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSource {
    pub provider: String,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub name: String,
    pub transport: String,
    pub connected: bool,
    pub tool_count: usize,
    pub prompt_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Providers that connected successfully.
    pub total_providers: usize,
    pub total_tools: usize,
    pub total_prompts: usize,
    /// Registered providers in order, followed by the ones that failed.
    pub providers: Vec<ProviderStats>,
    /// Native tool names exposed by more than one provider.
    pub name_conflicts: usize,
}

struct OpenedProvider {
    session: Box<dyn ProviderSession>,
    tools: Vec<MCPToolSchema>,
    prompts: Vec<MCPPromptSchema>,
}

/// Aggregates tools and prompts from many providers behind unique ids.
///
/// The first provider to expose a native name gets `provider:name`; any later
/// provider exposing the same name gets `name_provider`. Ids are never
/// reassigned once handed out.
pub struct ToolRegistry {
    connector: Arc<dyn ProviderConnector>,
    providers: Vec<ProviderConnection>,
    provider_index: HashMap<String, usize>,
    failed: Vec<(String, TransportConfig)>,
    catalog: Vec<ToolCatalogEntry>,
    routes: HashMap<String, ToolRoute>,
    name_occurrences: HashMap<String, usize>,
    prompts: Vec<PromptDescriptor>,
}

impl ToolRegistry {
    pub fn new(connector: Arc<dyn ProviderConnector>) -> Self {
        Self {
            connector,
            providers: Vec::new(),
            provider_index: HashMap::new(),
            failed: Vec::new(),
            catalog: Vec::new(),
            routes: HashMap::new(),
            name_occurrences: HashMap::new(),
            prompts: Vec::new(),
        }
    }

    /// Registry backed by real MCP connections.
    #[cfg(feature = "mcp")]
    pub fn with_mcp() -> Self {
        Self::new(Arc::new(super::client::MCPConnector::default()))
    }

    /// Connect one provider and merge its catalog.
    ///
    /// Returns `true` iff the connection and tool listing succeeded. Failures
    /// are logged and leave the provider out of the catalog.
    pub async fn add_provider(&mut self, name: &str, transport: TransportConfig) -> bool {
        if self.provider_index.contains_key(name) {
            tracing::warn!(provider = name, "provider already registered; ignoring duplicate");
            return false;
        }
        let opened = open_provider(Arc::clone(&self.connector), name, &transport).await;
        self.register(name, transport, opened)
    }

    /// Connect several providers concurrently, then merge them in the given order.
    ///
    /// Returns the number that registered successfully.
    pub async fn add_providers(&mut self, providers: Vec<(String, TransportConfig)>) -> usize {
        let attempts = providers.into_iter().map(|(name, transport)| {
            let connector = Arc::clone(&self.connector);
            async move {
                let opened = open_provider(connector, &name, &transport).await;
                (name, transport, opened)
            }
        });
        let results = futures::future::join_all(attempts).await;

        let mut registered = 0;
        for (name, transport, opened) in results {
            if self.provider_index.contains_key(&name) {
                tracing::warn!(provider = %name, "provider already registered; ignoring duplicate");
                if let Ok(mut opened) = opened {
                    close_quietly(&name, opened.session.as_mut()).await;
                }
                continue;
            }
            if self.register(&name, transport, opened) {
                registered += 1;
            }
        }
        registered
    }

    fn register(
        &mut self,
        name: &str,
        transport: TransportConfig,
        opened: Result<OpenedProvider, VoxError>,
    ) -> bool {
        let opened = match opened {
            Ok(opened) => opened,
            Err(error) => {
                tracing::warn!(provider = name, error = %error, "provider failed to connect; continuing without it");
                self.failed.push((name.to_string(), transport));
                return false;
            }
        };

        for tool in &opened.tools {
            let unique_id = self.assign_unique_id(name, &tool.name);
            self.routes.insert(
                unique_id.clone(),
                ToolRoute {
                    provider_name: name.to_string(),
                    native_name: tool.name.clone(),
                },
            );
            let mut provider_metadata = serde_json::Map::new();
            provider_metadata.insert("transport".into(), transport.kind().into());
            self.catalog.push(ToolCatalogEntry {
                unique_id,
                provider_name: name.to_string(),
                native_name: tool.name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                parameter_schema: tool.input_schema.clone(),
                provider_metadata,
            });
        }

        for prompt in &opened.prompts {
            self.prompts.push(PromptDescriptor {
                name: prompt.name.clone(),
                provider: name.to_string(),
                description: prompt.description.clone().unwrap_or_default(),
                arguments: prompt.arguments.clone(),
            });
        }

        tracing::info!(
            provider = name,
            transport = transport.kind(),
            tools = opened.tools.len(),
            prompts = opened.prompts.len(),
            "provider registered"
        );

        let instructions = opened.session.instructions();
        self.provider_index
            .insert(name.to_string(), self.providers.len());
        self.providers.push(ProviderConnection {
            provider_name: name.to_string(),
            transport_config: transport,
            cached_tools: opened.tools,
            cached_prompts: opened.prompts,
            instructions,
            handle: Mutex::new(Some(opened.session)),
        });
        true
    }

    fn assign_unique_id(&mut self, provider: &str, native: &str) -> String {
        let count = self.name_occurrences.entry(native.to_string()).or_insert(0);
        *count += 1;
        let base = if *count == 1 {
            format!("{provider}:{native}")
        } else {
            format!("{native}_{provider}")
        };

        if !self.routes.contains_key(&base) {
            return base;
        }
        // A provider listing the same name twice, or a native name that already
        // looks like a disambiguated id.
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.routes.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Aggregated tool catalog in registration order.
    pub fn all_tools(&self) -> &[ToolCatalogEntry] {
        &self.catalog
    }

    pub fn all_prompts(&self) -> &[PromptDescriptor] {
        &self.prompts
    }

    pub fn route(&self, unique_id: &str) -> Option<&ToolRoute> {
        self.routes.get(unique_id)
    }

    pub fn providers(&self) -> &[ProviderConnection] {
        &self.providers
    }

    /// Non-empty handshake instructions, in registration order.
    pub fn instruction_sources(&self) -> Vec<InstructionSource> {
        self.providers
            .iter()
            .filter_map(|p| {
                p.instructions
                    .as_ref()
                    .filter(|text| !text.trim().is_empty())
                    .map(|text| InstructionSource {
                        provider: p.provider_name.clone(),
                        instructions: text.clone(),
                    })
            })
            .collect()
    }

    /// Call a tool by its unique id.
    ///
    /// Unknown ids fail before any network traffic. Errors raised by the
    /// provider come back as [`VoxError::ToolExecution`].
    pub async fn invoke(
        &self,
        unique_id: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, VoxError> {
        let route = self
            .routes
            .get(unique_id)
            .ok_or_else(|| VoxError::ToolNotFound(unique_id.to_string()))?;

        let unavailable = || VoxError::ProviderUnavailable {
            provider: route.provider_name.clone(),
            tool: unique_id.to_string(),
        };
        let provider = self
            .provider_index
            .get(&route.provider_name)
            .and_then(|idx| self.providers.get(*idx))
            .ok_or_else(unavailable)?;

        let mut handle = provider.handle.lock().await;
        let session = handle.as_mut().ok_or_else(unavailable)?;

        tracing::debug!(tool = unique_id, provider = %route.provider_name, native = %route.native_name, "invoking tool");
        session
            .call_tool(&route.native_name, arguments)
            .await
            .map_err(|error| match error {
                VoxError::ToolExecution { message, .. } => VoxError::ToolExecution {
                    tool_name: unique_id.to_string(),
                    message,
                },
                other => VoxError::ToolExecution {
                    tool_name: unique_id.to_string(),
                    message: other.to_string(),
                },
            })
    }

    /// Render a prompt by name.
    ///
    /// Searches the given provider, or every provider advertising the prompt,
    /// and returns the first text part of the first successful render (empty
    /// when the prompt has no text). `None` when no provider could render it.
    pub async fn fetch_prompt(
        &self,
        name: &str,
        provider: Option<&str>,
        arguments: BTreeMap<String, String>,
    ) -> Option<String> {
        let candidates = self.providers.iter().filter(|p| {
            provider.map_or(true, |wanted| p.provider_name == wanted)
                && p.cached_prompts.iter().any(|prompt| prompt.name == name)
        });

        for candidate in candidates {
            let mut handle = candidate.handle.lock().await;
            let Some(session) = handle.as_mut() else {
                continue;
            };
            match session.get_prompt(name, arguments.clone()).await {
                Ok(parts) => {
                    let text = parts
                        .iter()
                        .find_map(|part| part.as_text())
                        .unwrap_or_default()
                        .to_string();
                    return Some(text);
                }
                Err(error) => {
                    tracing::warn!(prompt = name, provider = %candidate.provider_name, error = %error, "prompt fetch failed");
                }
            }
        }
        None
    }

    pub fn stats(&self) -> RegistryStats {
        let mut providers: Vec<ProviderStats> = self
            .providers
            .iter()
            .map(|p| ProviderStats {
                name: p.provider_name.clone(),
                transport: p.transport_config.kind().to_string(),
                connected: p
                    .handle
                    .try_lock()
                    .map(|handle| handle.is_some())
                    .unwrap_or(true),
                tool_count: p.cached_tools.len(),
                prompt_count: p.cached_prompts.len(),
            })
            .collect();
        providers.extend(self.failed.iter().map(|(name, transport)| ProviderStats {
            name: name.clone(),
            transport: transport.kind().to_string(),
            connected: false,
            tool_count: 0,
            prompt_count: 0,
        }));

        RegistryStats {
            total_providers: self.providers.len(),
            total_tools: self.catalog.len(),
            total_prompts: self.prompts.len(),
            providers,
            name_conflicts: self.name_occurrences.values().filter(|c| **c > 1).count(),
        }
    }

    /// Close every channel in reverse registration order. Idempotent.
    pub async fn shutdown(&mut self) {
        for provider in self.providers.iter().rev() {
            let session = provider.handle.lock().await.take();
            if let Some(mut session) = session {
                close_quietly(&provider.provider_name, session.as_mut()).await;
                tracing::debug!(provider = %provider.provider_name, "provider closed");
            }
        }
    }
}

async fn open_provider(
    connector: Arc<dyn ProviderConnector>,
    name: &str,
    transport: &TransportConfig,
) -> Result<OpenedProvider, VoxError> {
    let mut session = connector.connect(name, transport).await?;

    let tools = match session.list_tools().await {
        Ok(tools) => tools,
        Err(error) => {
            close_quietly(name, session.as_mut()).await;
            return Err(VoxError::ProviderConnection {
                provider: name.to_string(),
                message: format!("tool listing failed: {error}"),
            });
        }
    };

    let prompts = match session.list_prompts().await {
        Ok(prompts) => prompts,
        Err(error) => {
            tracing::debug!(provider = name, error = %error, "prompt listing unavailable");
            Vec::new()
        }
    };

    Ok(OpenedProvider {
        session,
        tools,
        prompts,
    })
}

async fn close_quietly(name: &str, session: &mut dyn ProviderSession) {
    if let Err(error) = session.close().await {
        tracing::warn!(provider = name, error = %error, "provider close failed");
    }
}
