//! Error Types

use thiserror::Error;

use crate::message::ConversationTrace;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool not present in the namespace
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool provider sent something we could not make sense of
    #[error("Protocol error from '{provider}': {message}")]
    Protocol { provider: String, message: String },

    /// Tool provider session is gone
    #[error("Connection to '{provider}' failed: {message}")]
    Connection { provider: String, message: String },

    /// Every tool provider failed, nothing to offer the model
    #[error("No tools available from any provider")]
    NoToolsAvailable,

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A run that ended in the `Failed` state.
///
/// Carries the partial conversation so the caller can inspect what happened
/// before the failure.
#[derive(Error, Debug)]
#[error("agent invocation failed after {} turns: {source}", trace.len())]
pub struct AgentInvocationError {
    pub trace: ConversationTrace,
    #[source]
    pub source: AgentError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_keeps_trace() {
        let mut trace = ConversationTrace::new();
        trace.push_user("hello");
        let err = AgentInvocationError {
            trace,
            source: AgentError::Provider("boom".into()),
        };
        assert_eq!(err.trace.len(), 1);
        assert!(err.to_string().contains("boom"));
    }
}
