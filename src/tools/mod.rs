//! Tool catalog model and argument handling.

pub mod arguments;
pub mod catalog;

pub use arguments::ToolArguments;
pub use catalog::{to_tool_definition, ParameterSummary, ToolCatalogEntry, ToolDefinition};
