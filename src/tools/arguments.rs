//! Parsing of model-supplied tool call arguments.

use crate::error::VoxError;

/// Tool call arguments after parsing the model's JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse the raw argument string of a tool call.
    ///
    /// Blank input is treated as an empty object. Anything that is not a
    /// JSON object fails with [`VoxError::ToolArgumentParse`].
    pub fn parse(tool_name: &str, raw: &str) -> Result<Self, VoxError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::Value::Object(serde_json::Map::new())));
        }

        let parsed: serde_json::Value =
            serde_json::from_str(trimmed).map_err(|e| VoxError::ToolArgumentParse {
                tool_name: tool_name.to_string(),
                message: e.to_string(),
            })?;

        match parsed {
            serde_json::Value::Object(_) => Ok(Self::new(parsed)),
            other => Err(VoxError::ToolArgumentParse {
                tool_name: tool_name.to_string(),
                message: format!("arguments must be a JSON object; got {other}"),
            }),
        }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }
}
