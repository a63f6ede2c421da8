//! Conversation Messages
//!
//! Two views of the same conversation live here:
//!
//! - [`ConversationTrace`] is what an agent run produces: an append-only,
//!   ordered list of user, assistant and tool-result turns.
//! - [`Message`] is the flat role/content shape sent to a model endpoint.
//!   [`ConversationTrace::to_messages`] converts one into the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message sent to a model endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Tool calls issued by the assistant in this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Call this message answers (tool messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name (tool messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message
    pub fn tool(
        name: impl Into<String>,
        content: impl Into<String>,
        tool_call_id: Option<String>,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.name = Some(name.into());
        msg.tool_call_id = tool_call_id;
        msg
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token, +4 for role overhead
        u32::try_from(self.content.len() / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}

/// One entry of a [`ConversationTrace`]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationTurn {
    /// The caller's input
    User { text: String },

    /// A model reply: answer text, tool requests, or both
    Assistant {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },

    /// Output of one tool call, attached to the call that produced it
    ToolResult {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        result: ToolResult,
    },
}

impl ConversationTurn {
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub const fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    pub const fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Assistant text, if this is an assistant turn
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            Self::Assistant { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Ordered, append-only record of one agent run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationTrace {
    turns: Vec<ConversationTurn>,
}

impl ConversationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a trace from the user's query
    pub fn from_query(query: impl Into<String>) -> Self {
        let mut trace = Self::new();
        trace.push_user(query);
        trace
    }

    /// Append a turn
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ConversationTurn::User { text: text.into() });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.push(ConversationTurn::Assistant {
            text: text.into(),
            tool_calls,
        });
    }

    pub fn push_tool_result(&mut self, result: ToolResult) {
        self.push(ConversationTurn::ToolResult {
            tool_name: result.name.clone(),
            call_id: result.id.clone(),
            result,
        });
    }

    /// All turns, in order
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConversationTurn> {
        self.turns.iter()
    }

    /// Get the last turn
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Whether any assistant turn carries non-blank text
    pub fn has_answer(&self) -> bool {
        self.turns
            .iter()
            .filter_map(ConversationTurn::assistant_text)
            .any(|text| !text.trim().is_empty())
    }

    /// Render the trace as model messages, optionally preceded by a system prompt
    pub fn to_messages(&self, system_prompt: Option<&str>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);

        if let Some(prompt) = system_prompt {
            messages.push(Message::system(prompt));
        }

        for turn in &self.turns {
            let message = match turn {
                ConversationTurn::User { text } => Message::user(text.clone()),
                ConversationTurn::Assistant { text, tool_calls } => {
                    Message::assistant_with_tools(text.clone(), tool_calls.clone())
                }
                ConversationTurn::ToolResult {
                    tool_name,
                    call_id,
                    result,
                } => Message::tool(tool_name.clone(), result.to_context(), call_id.clone()),
            };
            messages.push(message);
        }

        messages
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl<'a> IntoIterator for &'a ConversationTrace {
    type Item = &'a ConversationTurn;
    type IntoIter = std::slice::Iter<'a, ConversationTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
