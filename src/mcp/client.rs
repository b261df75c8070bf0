//! rmcp-backed provider sessions.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, GetPromptRequestParams, JsonObject,
    PromptMessage, ProtocolVersion, ResourceContents,
};
use rmcp::service::{ClientInitializeError, ServiceError};

use crate::error::VoxError;
use crate::util::timeout::with_timeout;

use super::registry::{ProviderConnector, ProviderSession};
use super::schema::{MCPPromptSchema, MCPToolSchema, PromptArgument, ToolCallOutput, ToolContent};
use super::transport::{MCPRunningService, TransportConfig};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects providers over MCP.
#[derive(Debug, Clone)]
pub struct MCPConnector {
    call_timeout: Duration,
}

impl Default for MCPConnector {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl MCPConnector {
    pub fn with_call_timeout(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}

#[async_trait]
impl ProviderConnector for MCPConnector {
    async fn connect(
        &self,
        provider: &str,
        transport: &TransportConfig,
    ) -> Result<Box<dyn ProviderSession>, VoxError> {
        tracing::debug!(provider, transport = transport.kind(), "connecting to MCP server");
        transport.validate(provider)?;
        let session = connect_with_protocol_fallback(transport)
            .await
            .map_err(|error| map_client_initialize_error(provider, error))?;
        Ok(Box::new(
            MCPSession::from_running_service(provider, session).with_call_timeout(self.call_timeout),
        ))
    }
}

async fn connect_with_protocol_fallback(
    transport: &TransportConfig,
) -> Result<MCPRunningService, ClientInitializeError> {
    let latest_client_info = rmcp::model::ClientInfo {
        protocol_version: ProtocolVersion::LATEST,
        ..Default::default()
    };

    match transport.connect(latest_client_info).await {
        Ok(session) => return Ok(session),
        Err(error) if should_retry_protocol_fallback(&error) => {}
        Err(error) => return Err(error),
    }

    let fallback_client_info = rmcp::model::ClientInfo {
        protocol_version: ProtocolVersion::V_2024_11_05,
        ..Default::default()
    };
    transport.connect(fallback_client_info).await
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

/// One initialized MCP session.
pub struct MCPSession {
    provider: String,
    session: Option<MCPRunningService>,
    call_timeout: Duration,
}

impl MCPSession {
    /// Wrap a session whose handshake already completed.
    pub fn from_running_service(provider: impl Into<String>, session: MCPRunningService) -> Self {
        Self {
            provider: provider.into(),
            session: Some(session),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    fn active(&self) -> Result<&MCPRunningService, VoxError> {
        self.session.as_ref().ok_or_else(|| VoxError::ProviderUnavailable {
            provider: self.provider.clone(),
            tool: String::new(),
        })
    }
}

#[async_trait]
impl ProviderSession for MCPSession {
    async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, VoxError> {
        let session = self.active()?;
        let tools = match session.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => session
                .list_tools(None)
                .await
                .map(|page| page.tools)
                .map_err(|error| map_service_error(&self.provider, "list_tools", error))?,
            Err(error) => return Err(map_service_error(&self.provider, "list_tools", error)),
        };
        Ok(tools.into_iter().map(map_mcp_tool_schema).collect())
    }

    async fn list_prompts(&mut self) -> Result<Vec<MCPPromptSchema>, VoxError> {
        let prompts = self
            .active()?
            .list_all_prompts()
            .await
            .map_err(|error| map_service_error(&self.provider, "list_prompts", error))?;
        Ok(prompts.into_iter().map(map_mcp_prompt_schema).collect())
    }

    fn instructions(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|session| session.peer_info())
            .and_then(|info| info.instructions.clone())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, VoxError> {
        let arguments = coerce_tool_arguments(arguments)?;
        let session = self.active()?;
        let provider = self.provider.as_str();

        let result = with_timeout(self.call_timeout, async {
            session
                .call_tool(CallToolRequestParams {
                    meta: None,
                    name: name.to_owned().into(),
                    arguments,
                    task: None,
                })
                .await
                .map_err(|error| map_service_error(provider, "call_tool", error))
        })
        .await?;

        map_call_result(name, result)
    }

    async fn get_prompt(
        &mut self,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<Vec<ToolContent>, VoxError> {
        let params: GetPromptRequestParams = serde_json::from_value(serde_json::json!({
            "name": name,
            "arguments": arguments,
        }))?;
        let session = self.active()?;
        let provider = self.provider.as_str();

        let result = with_timeout(self.call_timeout, async {
            session
                .get_prompt(params)
                .await
                .map_err(|error| map_service_error(provider, "get_prompt", error))
        })
        .await?;

        Ok(result.messages.iter().map(map_prompt_message).collect())
    }

    async fn close(&mut self) -> Result<(), VoxError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session
            .cancel()
            .await
            .map(|_| ())
            .map_err(|error| VoxError::ProviderConnection {
                provider: self.provider.clone(),
                message: format!("close failed: {error}"),
            })
    }
}

fn map_mcp_tool_schema(tool: rmcp::model::Tool) -> MCPToolSchema {
    MCPToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn map_mcp_prompt_schema(prompt: rmcp::model::Prompt) -> MCPPromptSchema {
    MCPPromptSchema {
        name: prompt.name.to_string(),
        description: prompt.description.map(|d| d.to_string()),
        arguments: prompt
            .arguments
            .unwrap_or_default()
            .into_iter()
            .map(|arg| PromptArgument {
                name: arg.name.to_string(),
                description: arg.description.map(|d| d.to_string()),
                required: arg.required.unwrap_or(false),
            })
            .collect(),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>, VoxError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(VoxError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn map_content(item: &Content) -> ToolContent {
    if let Some(text) = item.as_text() {
        return ToolContent::Text(text.text.clone());
    }
    if let Some(resource) = item.as_resource() {
        if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
            return ToolContent::Text(text.clone());
        }
    }
    ToolContent::Other(serde_json::to_value(item).unwrap_or(serde_json::Value::Null))
}

fn map_prompt_message(message: &PromptMessage) -> ToolContent {
    let content = serde_json::to_value(message)
        .ok()
        .and_then(|mut value| value.get_mut("content").map(serde_json::Value::take))
        .unwrap_or(serde_json::Value::Null);

    let text = match content.get("type").and_then(|t| t.as_str()) {
        Some("text") => content.get("text"),
        Some("resource") => content.get("resource").and_then(|r| r.get("text")),
        _ => None,
    };
    match text.and_then(|t| t.as_str()) {
        Some(text) => ToolContent::Text(text.to_string()),
        None => ToolContent::Other(content),
    }
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolCallOutput, VoxError> {
    let content: Vec<ToolContent> = result.content.iter().map(map_content).collect();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| {
                let text: Vec<&str> = content.iter().filter_map(|c| c.as_text()).collect();
                (!text.is_empty()).then(|| text.join("\n"))
            })
            .unwrap_or_else(|| "MCP tool returned an error result".into());

        return Err(VoxError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    Ok(ToolCallOutput {
        content,
        structured_content: result.structured_content,
    })
}

fn map_client_initialize_error(provider: &str, error: ClientInitializeError) -> VoxError {
    let message = match error {
        ClientInitializeError::ConnectionClosed(context) => {
            format!("initialize connection closed: {context}")
        }
        ClientInitializeError::TransportError { error, context } => {
            format!("initialize transport error ({context}): {error}")
        }
        ClientInitializeError::JsonRpcError(error) => format!(
            "initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        ),
        ClientInitializeError::Cancelled => "initialize cancelled".to_string(),
        other => format!("initialize error: {other}"),
    };
    VoxError::ProviderConnection {
        provider: provider.to_string(),
        message,
    }
}

fn map_service_error(provider: &str, context: &str, error: ServiceError) -> VoxError {
    let message = match error {
        ServiceError::Timeout { timeout } => {
            return VoxError::Timeout(timeout.as_millis() as u64);
        }
        ServiceError::McpError(error) => {
            format!("{context}: MCP error {}: {}", error.code.0, error.message)
        }
        ServiceError::TransportSend(error) => format!("{context}: transport send failed: {error}"),
        ServiceError::TransportClosed => format!("{context}: transport closed"),
        ServiceError::UnexpectedResponse => format!("{context}: unexpected MCP response"),
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            format!("{context}: request cancelled{suffix}")
        }
        other => format!("{context}: MCP service error: {other}"),
    };
    VoxError::ProviderConnection {
        provider: provider.to_string(),
        message,
    }
}
