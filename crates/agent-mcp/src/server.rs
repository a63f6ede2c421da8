//! Tool-provider side of the protocol.
//!
//! A provider implements [`ToolHandler`] and hands it to [`McpServer`],
//! which answers the handshake, catalog and call requests over any
//! [`MessageChannel`], normally its own stdin/stdout.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, IncomingJsonRpcRequest, InitializeParams, InitializeResult,
    Implementation, JsonRpcResponseOut, ListToolsResult, McpTool, MessageKind, PROTOCOL_VERSION,
    RpcError, classify_message, codes, methods,
};
use crate::transport::{LineChannel, MessageChannel};

/// The tools a provider exposes
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Catalog returned for `tools/list`
    fn tools(&self) -> Vec<McpTool>;

    /// Run a tool from the catalog.
    ///
    /// Failures the model should see are reported with
    /// [`CallToolResult::error`], not as protocol errors.
    async fn call(&self, name: &str, arguments: serde_json::Value) -> CallToolResult;
}

/// Request loop for a tool provider
pub struct McpServer<H> {
    info: Implementation,
    handler: H,
}

impl<H: ToolHandler> McpServer<H> {
    pub const fn new(info: Implementation, handler: H) -> Self {
        Self { info, handler }
    }

    /// Serve on this process's stdin/stdout until the client disconnects
    pub async fn serve_stdio(&self) -> Result<()> {
        let mut channel = LineChannel::new(tokio::io::stdin(), tokio::io::stdout());
        self.serve(&mut channel).await
    }

    /// Serve requests until the peer closes the channel
    pub async fn serve(&self, channel: &mut dyn MessageChannel) -> Result<()> {
        info!(server = %self.info.name, "Serving tools");

        loop {
            let message = match channel.recv().await {
                Ok(message) => message,
                Err(McpError::TransportClosed) => {
                    info!(server = %self.info.name, "Client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match classify_message(&message) {
                MessageKind::IncomingRequest => {
                    let response = match serde_json::from_value::<IncomingJsonRpcRequest>(message)
                    {
                        Ok(request) => self.handle_request(request).await,
                        Err(e) => JsonRpcResponseOut::error(
                            serde_json::Value::Null,
                            RpcError::new(codes::INVALID_REQUEST, e.to_string()),
                        ),
                    };
                    channel.send(&serde_json::to_value(&response)?).await?;
                }
                MessageKind::Notification => {
                    let method = message["method"].as_str().unwrap_or_default();
                    debug!("Notification: {}", method);
                }
                MessageKind::Response => {
                    debug!("Ignoring unsolicited response");
                }
                MessageKind::Invalid => {
                    warn!("Invalid JSON-RPC message");
                    let response = JsonRpcResponseOut::error(
                        serde_json::Value::Null,
                        RpcError::new(codes::INVALID_REQUEST, "missing id and method"),
                    );
                    channel.send(&serde_json::to_value(&response)?).await?;
                }
            }
        }
    }

    /// Answer one request
    pub async fn handle_request(&self, request: IncomingJsonRpcRequest) -> JsonRpcResponseOut {
        let id = request.id;
        let params = request.params.unwrap_or(serde_json::Value::Null);

        match request.method.as_str() {
            methods::INITIALIZE => {
                let requested = serde_json::from_value::<InitializeParams>(params).ok();
                if let Some(client) = requested.as_ref().map(|p| &p.client_info) {
                    info!("Client connected: {} {}", client.name, client.version);
                }
                let protocol_version = requested
                    .map(|p| p.protocol_version)
                    .filter(|v| v == PROTOCOL_VERSION)
                    .unwrap_or_else(|| PROTOCOL_VERSION.to_string());
                respond(
                    id,
                    &InitializeResult {
                        protocol_version,
                        capabilities: serde_json::json!({"tools": {}}),
                        server_info: self.info.clone(),
                        instructions: None,
                    },
                )
            }
            methods::PING => respond(id, &serde_json::json!({})),
            methods::TOOLS_LIST => respond(
                id,
                &ListToolsResult {
                    tools: self.handler.tools(),
                    next_cursor: None,
                },
            ),
            methods::TOOLS_CALL => {
                let params = match serde_json::from_value::<CallToolParams>(params) {
                    Ok(params) => params,
                    Err(e) => {
                        return JsonRpcResponseOut::error(
                            id,
                            RpcError::new(codes::INVALID_PARAMS, e.to_string()),
                        );
                    }
                };
                if !self.handler.tools().iter().any(|t| t.name == params.name) {
                    return JsonRpcResponseOut::error(
                        id,
                        RpcError::new(codes::INVALID_PARAMS, format!("Unknown tool: {}", params.name)),
                    );
                }
                info!(tool = %params.name, "Tool call");
                let result = self.handler.call(&params.name, params.arguments).await;
                respond(id, &result)
            }
            other => JsonRpcResponseOut::error(
                id,
                RpcError::new(codes::METHOD_NOT_FOUND, format!("Method not found: {other}")),
            ),
        }
    }
}

fn respond<T: Serialize>(id: serde_json::Value, result: &T) -> JsonRpcResponseOut {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponseOut::success(id, value),
        Err(e) => JsonRpcResponseOut::error(id, RpcError::new(codes::INTERNAL_ERROR, e.to_string())),
    }
}
