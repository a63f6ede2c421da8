//! # agent-runtime
//!
//! Model endpoints for the agent.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::ollama::OllamaProvider;
//!
//! let provider = OllamaProvider::from_env();
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .tools(tools.namespace.clone())
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{Agent, AgentError, LlmProvider, Message, Result, Role};
