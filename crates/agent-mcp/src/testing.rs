//! In-memory providers for tests

use async_trait::async_trait;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use crate::protocol::{CallToolResult, Implementation, McpTool, PROTOCOL_VERSION};
use crate::server::{McpServer, ToolHandler};
use crate::transport::{LineChannel, MessageChannel};

pub type DuplexChannel = LineChannel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Echoes its arguments back; `{"fail": true}` produces a tool-level error
pub struct EchoHandler {
    names: Vec<String>,
}

impl EchoHandler {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| (*n).to_string()).collect(),
        }
    }
}

#[async_trait]
impl ToolHandler for EchoHandler {
    fn tools(&self) -> Vec<McpTool> {
        self.names
            .iter()
            .map(|name| McpTool {
                name: name.clone(),
                description: Some(format!("Echo via {name}")),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}}
                }),
            })
            .collect()
    }

    async fn call(&self, name: &str, arguments: serde_json::Value) -> CallToolResult {
        if arguments["fail"].as_bool().unwrap_or(false) {
            return CallToolResult::error(format!("{name} failed"));
        }
        CallToolResult::success(format!("{name}: {arguments}"))
    }
}

/// Both ends of an in-memory line channel
pub fn channel_pair() -> (DuplexChannel, DuplexChannel) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let (ar, aw) = tokio::io::split(a);
    let (br, bw) = tokio::io::split(b);
    (LineChannel::new(ar, aw), LineChannel::new(br, bw))
}

/// Run an echo provider on a background task and return the client end
pub fn spawn_echo_provider(name: &str, tools: &[&str]) -> Box<dyn MessageChannel> {
    let (client, mut server_end) = channel_pair();
    let server = McpServer::new(Implementation::new(name, "0.0.1"), EchoHandler::new(tools));
    tokio::spawn(async move {
        let _ = server.serve(&mut server_end).await;
    });
    Box::new(client)
}

/// Complete the handshake, then answer each later request with the next
/// canned result. Once the script runs out the provider stays silent until
/// the client closes the channel.
pub fn scripted_provider(name: &str, results: Vec<serde_json::Value>) -> Box<dyn MessageChannel> {
    let (client, mut peer) = channel_pair();
    let name = name.to_string();
    tokio::spawn(async move {
        let Ok(init) = peer.recv().await else { return };
        let accepted = serde_json::json!({
            "jsonrpc": "2.0",
            "id": init["id"],
            "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": name, "version": "0.0.1"}
            }
        });
        if peer.send(&accepted).await.is_err() || peer.recv().await.is_err() {
            return;
        }

        for result in results {
            let Ok(request) = peer.recv().await else { return };
            let reply = serde_json::json!({"jsonrpc": "2.0", "id": request["id"], "result": result});
            if peer.send(&reply).await.is_err() {
                return;
            }
        }
        while peer.recv().await.is_ok() {}
    });
    Box::new(client)
}
