//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.
//!
//! Ollama is driven through plain chat messages: the offered tools are
//! described in the system prompt and the model requests calls with
//! ```` ```tool ```` blocks, which are parsed back into structured calls.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::{ToolDescriptor, extract_tool_calls, prompt_section, render_tool_call},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::ModelOptions as OllamaOptions,
};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);

        Self { host, port }
    }

    /// Base URL as shown in logs
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(config.host.clone(), config.port),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert agent messages to Ollama format.
    ///
    /// The tool section is appended to the first system message, or sent as
    /// its own system message when there is none. Earlier tool calls are
    /// written back as blocks so the model sees what it asked for.
    fn convert_messages(messages: &[Message], tools: &[ToolDescriptor]) -> Vec<ChatMessage> {
        let tool_section = (!tools.is_empty()).then(|| prompt_section(tools));
        let has_system = messages.iter().any(|m| m.role == Role::System);

        let mut converted = Vec::with_capacity(messages.len() + 1);
        let mut pending_section = tool_section;

        if !has_system {
            if let Some(section) = pending_section.take() {
                converted.push(ChatMessage::new(MessageRole::System, section));
            }
        }

        for m in messages {
            let (role, content) = match m.role {
                Role::System => {
                    let content = match pending_section.take() {
                        Some(section) => format!("{}\n\n{}", m.content, section),
                        None => m.content.clone(),
                    };
                    (MessageRole::System, content)
                }
                Role::User => (MessageRole::User, m.content.clone()),
                Role::Assistant => {
                    let mut content = m.content.clone();
                    for call in &m.tool_calls {
                        if !content.is_empty() {
                            content.push_str("\n\n");
                        }
                        content.push_str(&render_tool_call(call));
                    }
                    (MessageRole::Assistant, content)
                }
                // Tools appear as user context
                Role::Tool => (MessageRole::User, m.content.clone()),
            };
            converted.push(ChatMessage::new(role, content));
        }

        converted
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        let (content, tool_calls) = extract_tool_calls(&response.message.content);
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolUse
        };

        Completion {
            content,
            tool_calls,
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| {
                let prompt_tokens = u32::try_from(d.prompt_eval_count).unwrap_or(u32::MAX);
                let completion_tokens = u32::try_from(d.eval_count).unwrap_or(u32::MAX);
                TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens.saturating_add(completion_tokens),
                }
            }),
            finish_reason: Some(finish_reason),
        }
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> OllamaOptions {
        let options = OllamaOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));

        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(
                    "Ollama health check failed at {}: {}",
                    self.config.base_url(),
                    e
                );
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let ollama_messages = Self::convert_messages(messages, tools);
        let ollama_options = Self::build_options(options);

        tracing::debug!(
            model = %options.model,
            messages = ollama_messages.len(),
            tools = tools.len(),
            "Sending chat request to Ollama"
        );

        let request =
            ChatMessageRequest::new(options.model.clone(), ollama_messages).options(ollama_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }
}
