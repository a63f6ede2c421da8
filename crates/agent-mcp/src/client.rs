//! Client session with one tool provider.
//!
//! A session is created by a successful handshake and owns the provider's
//! channel until [`McpSession::close`]. Requests on one session are
//! serialised; sessions for different providers are independent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use agent_core::{AgentError, ToolBackend, ToolCall, ToolDescriptor, ToolResult};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::ProviderDescriptor;
use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseOut, ListToolsParams,
    ListToolsResult, MessageKind, PROTOCOL_VERSION, RpcError, classify_message, codes, methods,
};
use crate::transport::{MessageChannel, StdioTransport};

/// Upper bound on `tools/list` pages followed for one provider
const MAX_CATALOG_PAGES: usize = 64;

/// Handshake settings
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Identity announced to providers
    pub client_info: Implementation,

    /// How long a provider gets to answer `initialize`
    pub handshake_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_info: Implementation::new("agent-mcp", env!("CARGO_PKG_VERSION")),
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

/// An initialised session with one provider
pub struct McpSession {
    provider: String,
    server_info: Implementation,
    channel: Mutex<Box<dyn MessageChannel>>,
    closed: AtomicBool,
}

impl McpSession {
    /// Launch the provider and perform the handshake
    pub async fn connect(descriptor: &ProviderDescriptor, options: &ClientOptions) -> Result<Self> {
        descriptor.validate()?;
        let transport = StdioTransport::spawn(descriptor)?;
        Self::handshake(&descriptor.name, Box::new(transport), options).await
    }

    /// Perform the handshake over an already open channel.
    ///
    /// The channel is closed again when the handshake fails or times out.
    pub async fn handshake(
        provider: &str,
        mut channel: Box<dyn MessageChannel>,
        options: &ClientOptions,
    ) -> Result<Self> {
        let outcome = tokio::time::timeout(
            options.handshake_timeout,
            initialize(provider, channel.as_mut(), &options.client_info),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(server_info)) => {
                info!(
                    provider = %provider,
                    "Connected to {} {}",
                    server_info.name,
                    server_info.version
                );
                return Ok(Self {
                    provider: provider.to_string(),
                    server_info,
                    channel: Mutex::new(channel),
                    closed: AtomicBool::new(false),
                });
            }
            Ok(Err(McpError::TransportClosed)) => {
                McpError::connection(provider, "provider exited during handshake")
            }
            Ok(Err(McpError::Io(e))) => {
                McpError::connection(provider, format!("transport failed during handshake: {e}"))
            }
            Ok(Err(McpError::Rpc { code, message })) => McpError::connection(
                provider,
                format!("initialize rejected (code {code}): {message}"),
            ),
            Ok(Err(e)) => e,
            Err(_) => McpError::connection(
                provider,
                format!(
                    "handshake timed out after {}s",
                    options.handshake_timeout.as_secs()
                ),
            ),
        };

        if let Err(e) = channel.close().await {
            debug!(provider = %provider, "Closing channel after failed handshake: {}", e);
        }
        Err(failure)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub const fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    /// Fetch the provider's full tool catalog, following pagination
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut descriptors = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_CATALOG_PAGES {
            let params = serde_json::to_value(ListToolsParams { cursor: cursor.take() })?;
            let result = self.request(methods::TOOLS_LIST, Some(params)).await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                McpError::protocol(&self.provider, format!("malformed tool catalog: {e}"))
            })?;

            for tool in page.tools {
                if tool.name.trim().is_empty() {
                    return Err(McpError::protocol(&self.provider, "tool with empty name"));
                }
                descriptors.push(ToolDescriptor::new(
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema,
                    &self.provider,
                ));
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    debug!(provider = %self.provider, "Listed {} tools", descriptors.len());
                    return Ok(descriptors);
                }
            }
        }

        Err(McpError::protocol(
            &self.provider,
            format!("tool catalog exceeds {MAX_CATALOG_PAGES} pages"),
        ))
    }

    /// Call one tool by name
    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<CallToolResult> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request(methods::TOOLS_CALL, Some(params)).await?;
        serde_json::from_value(result).map_err(|e| {
            McpError::protocol(&self.provider, format!("malformed tool result: {e}"))
        })
    }

    /// Liveness check
    pub async fn ping(&self) -> Result<()> {
        self.request(methods::PING, None).await.map(|_| ())
    }

    /// Close the channel. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(provider = %self.provider, "Closing session");
        self.channel.lock().await.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if self.is_closed() {
            return Err(McpError::TransportClosed);
        }
        let mut channel = self.channel.lock().await;
        exchange(&self.provider, channel.as_mut(), method, params).await
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("provider", &self.provider)
            .field("server_info", &self.server_info)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolBackend for McpSession {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn call_tool(&self, call: &ToolCall) -> agent_core::Result<ToolResult> {
        match self.invoke(&call.name, call.arguments.clone()).await {
            Ok(result) => {
                let text = result.to_text();
                let data = serde_json::to_value(&result.content).ok();
                let mut tool_result = if result.is_error {
                    ToolResult::failure(&call.name, text)
                } else {
                    ToolResult::success(&call.name, text)
                };
                if let Some(data) = data {
                    tool_result = tool_result.with_data(data);
                }
                Ok(tool_result)
            }
            Err(McpError::TransportClosed) => Err(AgentError::Connection {
                provider: self.provider.clone(),
                message: "transport closed".into(),
            }),
            Err(e) if e.is_fatal_for_session() => Err(AgentError::Connection {
                provider: self.provider.clone(),
                message: e.to_string(),
            }),
            Err(e) => {
                warn!(provider = %self.provider, tool = %call.name, "Tool call failed: {}", e);
                Ok(ToolResult::failure(&call.name, e.to_string()))
            }
        }
    }
}

async fn initialize(
    provider: &str,
    channel: &mut dyn MessageChannel,
    client_info: &Implementation,
) -> Result<Implementation> {
    let params = serde_json::to_value(InitializeParams {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: serde_json::json!({}),
        client_info: client_info.clone(),
    })?;
    let result = exchange(provider, channel, methods::INITIALIZE, Some(params)).await?;
    let init: InitializeResult = serde_json::from_value(result)
        .map_err(|e| McpError::protocol(provider, format!("malformed initialize result: {e}")))?;

    if init.protocol_version != PROTOCOL_VERSION {
        debug!(
            provider = %provider,
            "Provider answered with protocol version {}",
            init.protocol_version
        );
    }

    let initialized = JsonRpcNotification::new(methods::INITIALIZED, None);
    channel.send(&serde_json::to_value(&initialized)?).await?;
    Ok(init.server_info)
}

/// Send one request and wait for its response.
///
/// Provider notifications and stale responses are skipped; provider
/// requests are answered so the provider is never left waiting.
async fn exchange(
    provider: &str,
    channel: &mut dyn MessageChannel,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value> {
    let request = JsonRpcRequest::new(method, params);
    trace!(provider = %provider, id = request.id, "-> {}", method);
    channel.send(&serde_json::to_value(&request)?).await?;

    loop {
        let message = channel.recv().await?;
        match classify_message(&message) {
            MessageKind::Response => {
                let response: JsonRpcResponse = serde_json::from_value(message).map_err(|e| {
                    McpError::protocol(provider, format!("malformed response: {e}"))
                })?;
                if response.id != Some(request.id) {
                    warn!(
                        provider = %provider,
                        "Skipping response for unknown request {:?}",
                        response.id
                    );
                    continue;
                }
                if let Some(error) = response.error {
                    return Err(McpError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }
                return Ok(response.result.unwrap_or(serde_json::Value::Null));
            }
            MessageKind::IncomingRequest => {
                let id = message["id"].clone();
                let reply = if message["method"] == methods::PING {
                    JsonRpcResponseOut::success(id, serde_json::json!({}))
                } else {
                    JsonRpcResponseOut::error(
                        id,
                        RpcError::new(codes::METHOD_NOT_FOUND, "client does not handle requests"),
                    )
                };
                channel.send(&serde_json::to_value(&reply)?).await?;
            }
            MessageKind::Notification => {
                trace!(provider = %provider, "Notification: {}", message["method"]);
            }
            MessageKind::Invalid => {
                warn!(provider = %provider, "Ignoring invalid message: {}", message);
            }
        }
    }
}
