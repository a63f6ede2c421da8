//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction and a tool
//! namespace backed by external tool providers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tool     │  │   LlmProvider       │  │
//! │  │    Loop     │──│  Namespace  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │         │                │                                   │
//! │         ▼                ▼                                   │
//! │  ConversationTrace   ToolBackend (one per tool provider)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Ollama or any other
//! chat-completion backend without changing agent logic. `ToolBackend`
//! does the same for the processes that host the tools.

pub mod error;
pub mod extract;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;

pub use error::{AgentError, AgentInvocationError, Result};
pub use extract::{extract_answers, format_answer};
pub use message::{ConversationTrace, ConversationTurn, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentRun, RunState};
pub use tool::{ToolBackend, ToolCall, ToolDescriptor, ToolNamespace, ToolResult};
