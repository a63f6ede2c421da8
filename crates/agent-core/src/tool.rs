//! Tool System
//!
//! Tools are not implemented in-process: each one is declared by an external
//! tool provider and reached through a [`ToolBackend`]. The [`ToolNamespace`]
//! merges the declarations of every provider into one catalog and keeps a
//! routing table from tool name to the backend that declared it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as a JSON object
    #[serde(default = "empty_arguments")]
    pub arguments: serde_json::Value,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

fn empty_arguments() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Format for injection into the model's context
    pub fn to_context(&self) -> String {
        if self.success {
            format!("[Tool '{}' returned]\n{}", self.name, self.output)
        } else {
            format!("[Tool '{}' failed]\n{}", self.name, self.output)
        }
    }
}

/// A callable tool as declared by a provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// JSON Schema of the arguments object
    pub input_schema: serde_json::Value,

    /// Provider that declared the tool
    pub provider_name: String,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            provider_name: provider_name.into(),
        }
    }

    /// Parameter names listed as required by the schema
    pub fn required_parameters(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Something that can execute the tools one provider declared.
///
/// Implemented by a live provider session; test code implements it with
/// in-memory fakes.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Name of the provider behind this backend
    fn provider_name(&self) -> &str;

    /// Execute a tool call.
    ///
    /// Tool-level failures come back as `Ok` with a failed [`ToolResult`].
    /// `Err` means the call could not be routed or the provider is gone.
    async fn call_tool(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// Merged tool catalog with a name → backend routing table.
///
/// Tools keep the order they were registered in. Names are unique: when two
/// providers declare the same name, the first registration wins and the later
/// one is rejected.
#[derive(Default)]
pub struct ToolNamespace {
    tools: Vec<ToolDescriptor>,
    routes: HashMap<String, usize>,
    backends: Vec<Arc<dyn ToolBackend>>,
}

impl ToolNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the catalog of one provider.
    ///
    /// Returns the descriptors that were rejected because their name was
    /// already taken.
    pub fn register(
        &mut self,
        backend: Arc<dyn ToolBackend>,
        tools: Vec<ToolDescriptor>,
    ) -> Vec<ToolDescriptor> {
        let index = self.backends.len();
        let mut accepted = 0;
        let mut rejected = Vec::new();

        for tool in tools {
            if self.routes.contains_key(&tool.name) {
                tracing::warn!(
                    tool = %tool.name,
                    provider = %backend.provider_name(),
                    "Duplicate tool name, keeping the first registration"
                );
                rejected.push(tool);
                continue;
            }
            self.routes.insert(tool.name.clone(), index);
            self.tools.push(tool);
            accepted += 1;
        }

        if accepted > 0 {
            self.backends.push(backend);
        }

        rejected
    }

    /// Provider that owns a tool
    pub fn provider_of(&self, name: &str) -> Option<&str> {
        self.routes
            .get(name)
            .map(|&index| self.backends[index].provider_name())
    }

    /// Route a call to the provider that declared the tool
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        let index = *self
            .routes
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let mut result = self.backends[index].call_tool(call).await?;
        result.id.clone_from(&call.id);
        Ok(result)
    }

    /// All descriptors, in registration order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolNamespace")
            .field("tools", &self.names())
            .field("backends", &self.backends.len())
            .finish()
    }
}

// ============================================================================
// Text tool-call syntax
// ============================================================================

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// Describe tools for models that request calls through fenced JSON blocks
pub fn prompt_section(tools: &[ToolDescriptor]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
    prompt.push_str(
        "```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n",
    );
    prompt.push_str("You may emit several blocks to call several tools at once.\n\n");

    for tool in tools {
        let _ = writeln!(prompt, "### {}", tool.name);
        let _ = writeln!(prompt, "{}", tool.description);

        let required = tool.required_parameters();
        if let Some(properties) = tool
            .input_schema
            .get("properties")
            .and_then(|p| p.as_object())
            .filter(|p| !p.is_empty())
        {
            prompt.push_str("**Parameters:**\n");
            for (name, schema) in properties {
                let param_type = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                let description = schema
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or("");
                let flag = if required.contains(&name.as_str()) {
                    " (required)"
                } else {
                    ""
                };
                let _ = writeln!(prompt, "- `{name}` ({param_type}){flag}: {description}");
            }
        }
        prompt.push('\n');
    }

    prompt
}

/// Render a call the way a model is asked to write it
pub fn render_tool_call(call: &ToolCall) -> String {
    let body = serde_json::json!({
        "tool": call.name,
        "arguments": call.arguments,
    });
    format!("{TOOL_FENCE}\n{body}\n{FENCE_END}")
}

/// Split a model reply into its prose and the tool calls it requests.
///
/// Every well-formed ```` ```tool ```` block is parsed and removed from the
/// text. When there are none, a bare JSON object with a `"tool"` key is
/// accepted as a single call. Calls without an ID get a fresh UUID.
pub fn extract_tool_calls(content: &str) -> (String, Vec<ToolCall>) {
    let mut calls = Vec::new();
    let mut text = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find(TOOL_FENCE) {
        let after_marker = &rest[start + TOOL_FENCE.len()..];
        let Some(end) = after_marker.find(FENCE_END) else {
            break;
        };

        let json_str = after_marker[..end].trim();
        let block_end = start + TOOL_FENCE.len() + end + FENCE_END.len();

        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => {
                text.push_str(&rest[..start]);
                calls.push(call);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed tool block");
                text.push_str(&rest[..block_end]);
            }
        }
        rest = &rest[block_end..];
    }
    text.push_str(rest);

    if calls.is_empty() {
        if let Some((prose, call)) = parse_inline_tool_call(content) {
            text = prose;
            calls.push(call);
        }
    }

    for call in &mut calls {
        if call.id.is_none() {
            call.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }

    (text.trim().to_string(), calls)
}

/// Try to parse inline JSON tool call
fn parse_inline_tool_call(content: &str) -> Option<(String, ToolCall)> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    let call = serde_json::from_str::<ToolCall>(&content[start..=end]).ok()?;
    let prose = format!("{}{}", &content[..start], &content[end + 1..]);
    Some((prose, call))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBackend(&'static str);

    #[async_trait]
    impl ToolBackend for EchoBackend {
        fn provider_name(&self) -> &str {
            self.0
        }

        async fn call_tool(&self, call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success(
                call.name.clone(),
                format!("{} from {}", call.arguments, self.0),
            ))
        }
    }

    fn descriptor(name: &str, provider: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            format!("{name} tool"),
            serde_json::json!({"type": "object", "properties": {}}),
            provider,
        )
    }

    #[test]
    fn test_register_preserves_order_and_rejects_duplicates() {
        let mut ns = ToolNamespace::new();
        let rejected = ns.register(
            Arc::new(EchoBackend("a")),
            vec![descriptor("t1", "a"), descriptor("t2", "a")],
        );
        assert!(rejected.is_empty());

        let rejected = ns.register(
            Arc::new(EchoBackend("b")),
            vec![descriptor("t2", "b"), descriptor("t3", "b")],
        );
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].provider_name, "b");

        assert_eq!(ns.names(), vec!["t1", "t2", "t3"]);
        assert_eq!(ns.provider_of("t2"), Some("a"));
        assert_eq!(ns.provider_of("t3"), Some("b"));
    }

    #[tokio::test]
    async fn test_invoke_routes_to_owner() {
        let mut ns = ToolNamespace::new();
        ns.register(Arc::new(EchoBackend("a")), vec![descriptor("t1", "a")]);
        ns.register(Arc::new(EchoBackend("b")), vec![descriptor("t2", "b")]);

        let call = ToolCall::new("t2", serde_json::json!({"x": 1})).with_id("call-9");
        let result = ns.invoke(&call).await.unwrap();
        assert!(result.success);
        assert!(result.output.ends_with("from b"));
        assert_eq!(result.id.as_deref(), Some("call-9"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let ns = ToolNamespace::new();
        let err = ns
            .invoke(&ToolCall::new("nope", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_extract_fenced_calls() {
        let content = r#"Let me check that for you.
```tool
{"tool": "get_crypto_news", "arguments": {}}
```
```tool
{"tool": "get_stock_price", "arguments": {"symbol": "AAPL"}}
```"#;

        let (text, calls) = extract_tool_calls(content);
        assert_eq!(text, "Let me check that for you.");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "get_crypto_news");
        assert_eq!(calls[1].arguments["symbol"], "AAPL");
        assert!(calls.iter().all(|c| c.id.is_some()));
    }

    #[test]
    fn test_extract_inline_call() {
        let content = r#"{"tool": "get_stock_price", "arguments": {"symbol": "AAPL"}}"#;
        let (text, calls) = extract_tool_calls(content);
        assert!(text.is_empty());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_stock_price");
    }

    #[test]
    fn test_extract_plain_answer() {
        let (text, calls) = extract_tool_calls("AAPL trades at $230.");
        assert_eq!(text, "AAPL trades at $230.");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_malformed_block_is_kept_as_text() {
        let content = "```tool\nnot json\n```";
        let (text, calls) = extract_tool_calls(content);
        assert!(calls.is_empty());
        assert_eq!(text, content);
    }

    #[test]
    fn test_render_then_extract() {
        let call = ToolCall::new("t1", serde_json::json!({"q": "btc"}));
        let (_, calls) = extract_tool_calls(&render_tool_call(&call));
        assert_eq!(calls[0].name, "t1");
        assert_eq!(calls[0].arguments, call.arguments);
    }

    #[test]
    fn test_prompt_section_lists_parameters() {
        let tool = ToolDescriptor::new(
            "get_stock_price",
            "Latest price for a ticker",
            serde_json::json!({
                "type": "object",
                "properties": {"symbol": {"type": "string", "description": "Ticker"}},
                "required": ["symbol"]
            }),
            "yfinance",
        );
        let section = prompt_section(&[tool]);
        assert!(section.contains("### get_stock_price"));
        assert!(section.contains("- `symbol` (string) (required): Ticker"));
    }
}
