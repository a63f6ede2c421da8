//! Agent MCP - Tool provider plumbing
//!
//! Everything between the agent and its external tool providers:
//!
//! - [`ProviderDescriptorSet`]: which providers exist and how to launch them
//! - [`McpSession`]: one initialised client session per provider
//! - [`ToolAggregator`]: connects to all providers and merges their catalogs
//! - [`McpServer`]: the provider side, used by tool servers in this workspace

pub mod aggregator;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

#[cfg(test)]
mod testing;

pub use aggregator::{
    AggregatedTools, AggregatorOptions, Connector, ProviderOutcome, ProviderReport,
    StdioConnector, ToolAggregator,
};
pub use client::{ClientOptions, McpSession};
pub use config::{
    LaunchSpec, ProviderDescriptor, ProviderDescriptorSet, SERVERS_CONFIG_ENV, TransportKind,
};
pub use error::{McpError, Result};
pub use protocol::{CallToolResult, Content, Implementation, McpTool};
pub use server::{McpServer, ToolHandler};
pub use transport::{LineChannel, MessageChannel, StdioTransport};
