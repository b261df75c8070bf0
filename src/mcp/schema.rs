//! MCP schema types shared by sessions and the registry.

use serde::{Deserialize, Serialize};

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Prompt template advertised by one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPPromptSchema {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A prompt in the aggregated catalog, tagged with its owning provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    pub provider: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
}

/// One typed part of a tool or prompt result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text(String),
    /// Any non-text part (image, embedded resource, link) in its wire form.
    Other(serde_json::Value),
}

impl ToolContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Other(_) => None,
        }
    }
}

/// Raw result of a successful tool call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCallOutput {
    pub content: Vec<ToolContent>,
    pub structured_content: Option<serde_json::Value>,
}

impl ToolCallOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text(text.into())],
            structured_content: None,
        }
    }

    /// Render as the text of a tool-role message.
    ///
    /// Parts are joined by newlines with non-text parts serialized to JSON.
    /// With no content at all the structured payload is used, and failing
    /// that the literal `success`.
    pub fn render(&self) -> String {
        if self.content.is_empty() {
            return match &self.structured_content {
                Some(structured) => structured.to_string(),
                None => "success".to_string(),
            };
        }

        self.content
            .iter()
            .map(|part| match part {
                ToolContent::Text(text) => text.clone(),
                ToolContent::Other(value) => value.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
