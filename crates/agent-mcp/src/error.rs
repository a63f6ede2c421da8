//! Error types for tool-provider communication

use agent_core::AgentError;
use thiserror::Error;

/// Result type alias for tool-provider operations
pub type Result<T> = std::result::Result<T, McpError>;

/// Errors that can occur while configuring, reaching or talking to a tool provider
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Configuration error for '{provider}': {message}")]
    Config { provider: String, message: String },

    #[error("Failed to connect to '{provider}': {message}")]
    Connection { provider: String, message: String },

    #[error("Protocol error from '{provider}': {message}")]
    Protocol { provider: String, message: String },

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("'{provider}' timed out during {operation}")]
    Timeout { provider: String, operation: String },

    #[error("Transport closed")]
    TransportClosed,

    #[error("No tools loaded from any provider (attempted: {})", attempted.join(", "))]
    NoToolsAvailable { attempted: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid provider configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl McpError {
    pub fn config(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn connection(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn protocol(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the session that produced this error can still be used
    pub const fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            Self::TransportClosed | Self::Io(_) | Self::Connection { .. } | Self::Timeout { .. }
        )
    }
}

impl From<McpError> for AgentError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::Config { message, .. } => Self::Config(message),
            McpError::Connection { provider, message } => Self::Connection { provider, message },
            McpError::Protocol { provider, message } => Self::Protocol { provider, message },
            McpError::NoToolsAvailable { .. } => Self::NoToolsAvailable,
            McpError::Io(e) => Self::Io(e),
            McpError::Json(e) => Self::Json(e),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
