//! Tool providers: transport config, MCP sessions and the aggregated registry.

pub mod registry;
pub mod schema;
pub mod transport;

#[cfg(feature = "mcp")]
pub mod client;

#[cfg(feature = "mcp")]
pub use client::{MCPConnector, MCPSession};
pub use registry::{
    InstructionSource, ProviderConnector, ProviderSession, ProviderStats, RegistryStats,
    ToolRegistry, ToolRoute,
};
pub use schema::{
    MCPPromptSchema, MCPToolSchema, PromptArgument, PromptDescriptor, ToolCallOutput, ToolContent,
};
pub use transport::TransportConfig;
