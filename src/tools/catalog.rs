//! Tool catalog entries and their mapping to model-facing tool schemas.

use serde::{Deserialize, Serialize};

/// Canonical description of one discoverable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalogEntry {
    /// Collision-free identifier exposed to the model.
    pub unique_id: String,
    pub provider_name: String,
    /// Name of the tool on its provider.
    pub native_name: String,
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub parameter_schema: serde_json::Value,
    #[serde(default)]
    pub provider_metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolCatalogEntry {
    /// Flatten the top-level schema properties into `(name, type, description)` triples.
    pub fn parameters(&self) -> Vec<ParameterSummary> {
        let Some(properties) = self
            .parameter_schema
            .get("properties")
            .and_then(|p| p.as_object())
        else {
            return Vec::new();
        };

        properties
            .iter()
            .map(|(name, info)| ParameterSummary {
                name: name.clone(),
                kind: info
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("string")
                    .to_string(),
                description: info
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSummary {
    pub name: String,
    pub kind: String,
    pub description: String,
}

/// Function-calling tool schema handed to the completion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Render in the chat-completions `tools` array shape.
    pub fn to_openai_value(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Map a catalog entry to the schema record the model sees.
pub fn to_tool_definition(entry: &ToolCatalogEntry) -> ToolDefinition {
    let parameters = if entry.parameter_schema.is_object() {
        entry.parameter_schema.clone()
    } else {
        serde_json::json!({ "type": "object", "properties": {} })
    };

    ToolDefinition {
        name: entry.unique_id.clone(),
        description: entry.description.clone(),
        parameters,
    }
}
