//! Transport layer for tool providers.
//!
//! - [`MessageChannel`]: a bidirectional JSON message channel, the only
//!   thing client and server code depend on.
//! - [`LineChannel`]: newline-delimited JSON over any async reader/writer
//!   pair. Used for process pipes, for our own stdin/stdout when serving,
//!   and over `tokio::io::duplex` in tests.
//! - [`StdioTransport`]: launches a provider process and owns it; the child
//!   is killed when the transport is closed or dropped.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use crate::config::{ProviderDescriptor, TransportKind};
use crate::error::{McpError, Result};

/// Grace period for a provider to exit after its stdin is closed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A bidirectional JSON message channel.
///
/// Single consumer: callers that share one must serialise access.
#[async_trait]
pub trait MessageChannel: Send {
    /// Send one message
    async fn send(&mut self, message: &serde_json::Value) -> Result<()>;

    /// Wait for the next message. [`McpError::TransportClosed`] on end of stream.
    async fn recv(&mut self) -> Result<serde_json::Value>;

    /// Release the channel. Further sends fail.
    async fn close(&mut self) -> Result<()>;
}

/// Newline-delimited JSON over an async reader/writer pair
pub struct LineChannel<R, W> {
    reader: BufReader<R>,
    writer: Option<W>,
    line: String,
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: Some(writer),
            line: String::new(),
        }
    }
}

#[async_trait]
impl<R, W> MessageChannel for LineChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(McpError::TransportClosed)?;
        let mut frame = serde_json::to_string(message)?;
        trace!("Channel sending: {}", frame);
        frame.push('\n');
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<serde_json::Value> {
        loop {
            self.line.clear();
            let bytes_read = self.reader.read_line(&mut self.line).await?;
            if bytes_read == 0 {
                return Err(McpError::TransportClosed);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            trace!("Channel received: {}", trimmed);

            match serde_json::from_str(trimmed) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Skipping non-JSON line ({}): {}", e, trimmed);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

/// A launched provider process reached over its stdin/stdout
pub struct StdioTransport {
    provider: String,
    channel: LineChannel<ChildStdout, ChildStdin>,
    child: Child,
}

impl StdioTransport {
    /// Launch the provider described by `descriptor`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(descriptor: &ProviderDescriptor) -> Result<Self> {
        let launch = &descriptor.launch;
        let TransportKind::Stdio = launch.transport;

        debug!(
            provider = %descriptor.name,
            "Spawning tool provider: {} {}",
            launch.command,
            launch.args.join(" ")
        );

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args)
            .envs(&launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &launch.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::connection(&descriptor.name, format!("spawn failed: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::connection(&descriptor.name, "failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::connection(&descriptor.name, "failed to capture stdout"))?;

        Ok(Self {
            provider: descriptor.name.clone(),
            channel: LineChannel::new(stdout, stdin),
            child,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

#[async_trait]
impl MessageChannel for StdioTransport {
    async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        self.channel.send(message).await
    }

    async fn recv(&mut self) -> Result<serde_json::Value> {
        self.channel.recv().await
    }

    /// Close stdin, give the process a moment to exit, then kill it
    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.channel.close().await {
            debug!(provider = %self.provider, "Closing provider stdin failed: {}", e);
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(provider = %self.provider, "Provider exited: {}", status);
            }
            Ok(Err(e)) => {
                warn!(provider = %self.provider, "Waiting for provider failed: {}", e);
            }
            Err(_) => {
                debug!(provider = %self.provider, "Provider did not exit, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchSpec;

    #[tokio::test]
    async fn test_line_channel_round_trip() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let (cr, cw) = tokio::io::split(client_io);
        let (sr, sw) = tokio::io::split(server_io);
        let mut client = LineChannel::new(cr, cw);
        let mut server = LineChannel::new(sr, sw);

        client
            .send(&serde_json::json!({"jsonrpc": "2.0", "method": "ping", "id": 1}))
            .await
            .unwrap();
        let received = server.recv().await.unwrap();
        assert_eq!(received["method"], "ping");
    }

    #[tokio::test]
    async fn test_line_channel_skips_noise_and_reports_eof() {
        let input: &[u8] = b"starting up...\n\n{\"id\":1,\"result\":{}}\n";
        let mut channel = LineChannel::new(input, tokio::io::sink());

        let message = channel.recv().await.unwrap();
        assert_eq!(message["id"], 1);
        assert!(matches!(channel.recv().await, Err(McpError::TransportClosed)));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let mut channel = LineChannel::new(tokio::io::empty(), tokio::io::sink());
        channel.close().await.unwrap();
        let result = channel.send(&serde_json::json!({})).await;
        assert!(matches!(result, Err(McpError::TransportClosed)));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_is_connection_error() {
        let descriptor = ProviderDescriptor::new(
            "ghost",
            LaunchSpec::stdio("/nonexistent/definitely-not-a-provider", &[]),
        );
        let err = StdioTransport::spawn(&descriptor).err().unwrap();
        assert!(matches!(err, McpError::Connection { provider, .. } if provider == "ghost"));
    }
}
