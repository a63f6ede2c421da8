//! Tool Aggregator
//!
//! Connects to every configured provider, lists its tools and merges the
//! catalogs into one [`ToolNamespace`]. A provider that cannot be reached is
//! reported and skipped; the run only fails when no provider yields a tool.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{ToolDescriptor, ToolNamespace};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::client::{ClientOptions, McpSession};
use crate::config::{ProviderDescriptor, ProviderDescriptorSet};
use crate::error::{McpError, Result};

/// Opens a session with one provider
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, descriptor: &ProviderDescriptor) -> Result<McpSession>;
}

/// Launches providers as child processes
#[derive(Clone, Debug, Default)]
pub struct StdioConnector {
    pub options: ClientOptions,
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(&self, descriptor: &ProviderDescriptor) -> Result<McpSession> {
        McpSession::connect(descriptor, &self.options).await
    }
}

/// Aggregation settings
#[derive(Clone, Debug)]
pub struct AggregatorOptions {
    /// Time allowed for one provider's `tools/list`
    pub list_timeout: Duration,

    /// Connect to all providers at once instead of one after another
    pub concurrent: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            list_timeout: Duration::from_secs(30),
            concurrent: true,
        }
    }
}

/// What happened to one provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// Session open; names of the tools it contributed
    Connected { tools: Vec<String> },
    /// Skipped; the reason is also logged as a warning
    Unavailable { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderReport {
    pub provider: String,
    pub outcome: ProviderOutcome,
}

impl ProviderReport {
    pub const fn is_connected(&self) -> bool {
        matches!(self.outcome, ProviderOutcome::Connected { .. })
    }
}

/// The merged catalog plus the sessions that serve it
pub struct AggregatedTools {
    pub namespace: Arc<ToolNamespace>,
    pub sessions: Vec<Arc<McpSession>>,
    pub reports: Vec<ProviderReport>,
}

impl AggregatedTools {
    /// Close every session
    pub async fn shutdown(&self) {
        close_all(&self.sessions).await;
    }
}

impl std::fmt::Debug for AggregatedTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatedTools")
            .field("tools", &self.namespace.names())
            .field("reports", &self.reports)
            .finish_non_exhaustive()
    }
}

/// Builds the tool namespace from a descriptor set
#[derive(Clone, Debug, Default)]
pub struct ToolAggregator {
    options: AggregatorOptions,
}

impl ToolAggregator {
    pub const fn new(options: AggregatorOptions) -> Self {
        Self { options }
    }

    /// Launch every provider as a child process with default settings
    pub async fn aggregate(descriptors: &ProviderDescriptorSet) -> Result<AggregatedTools> {
        Self::aggregate_with(descriptors, &StdioConnector::default()).await
    }

    /// Aggregate with default settings through any connector
    pub async fn aggregate_with(
        descriptors: &ProviderDescriptorSet,
        connector: &dyn Connector,
    ) -> Result<AggregatedTools> {
        Self::default().run(descriptors, connector).await
    }

    /// Connect, list and merge.
    ///
    /// Tools are registered in descriptor order, then in each provider's
    /// catalog order. Fails with [`McpError::NoToolsAvailable`] when the
    /// merged namespace is empty.
    pub async fn run(
        &self,
        descriptors: &ProviderDescriptorSet,
        connector: &dyn Connector,
    ) -> Result<AggregatedTools> {
        let attempts = if self.options.concurrent {
            join_all(descriptors.iter().map(|d| self.load_provider(d, connector))).await
        } else {
            let mut attempts = Vec::with_capacity(descriptors.len());
            for descriptor in descriptors {
                attempts.push(self.load_provider(descriptor, connector).await);
            }
            attempts
        };

        let mut namespace = ToolNamespace::new();
        let mut sessions = Vec::new();
        let mut reports = Vec::with_capacity(attempts.len());

        for (descriptor, attempt) in descriptors.iter().zip(attempts) {
            let outcome = match attempt {
                Ok((session, tools)) => {
                    let session = Arc::new(session);
                    let rejected = namespace.register(session.clone(), tools.clone());
                    let accepted: Vec<String> = tools
                        .into_iter()
                        .filter(|t| !rejected.iter().any(|r| r.name == t.name))
                        .map(|t| t.name)
                        .collect();

                    if accepted.is_empty() {
                        warn!(
                            provider = %descriptor.name,
                            "All tools shadowed by earlier providers, closing session"
                        );
                        close_all(std::slice::from_ref(&session)).await;
                        ProviderOutcome::Unavailable {
                            reason: "every tool name already taken".into(),
                        }
                    } else {
                        info!(
                            provider = %descriptor.name,
                            "Loaded {} tools: {}",
                            accepted.len(),
                            accepted.join(", ")
                        );
                        sessions.push(session);
                        ProviderOutcome::Connected { tools: accepted }
                    }
                }
                Err(e) => {
                    warn!(provider = %descriptor.name, "Provider unavailable: {}", e);
                    ProviderOutcome::Unavailable {
                        reason: e.to_string(),
                    }
                }
            };
            reports.push(ProviderReport {
                provider: descriptor.name.clone(),
                outcome,
            });
        }

        if namespace.is_empty() {
            close_all(&sessions).await;
            return Err(McpError::NoToolsAvailable {
                attempted: descriptors.names().into_iter().map(String::from).collect(),
            });
        }

        info!(
            "Tool namespace ready: {} tools from {} providers",
            namespace.len(),
            sessions.len()
        );

        Ok(AggregatedTools {
            namespace: Arc::new(namespace),
            sessions,
            reports,
        })
    }

    async fn load_provider(
        &self,
        descriptor: &ProviderDescriptor,
        connector: &dyn Connector,
    ) -> Result<(McpSession, Vec<ToolDescriptor>)> {
        descriptor.validate()?;
        let session = connector.connect(descriptor).await?;
        let tools = self.list_catalog(&session).await?;
        Ok((session, tools))
    }

    /// List a fresh session's tools, closing the session if that fails
    async fn list_catalog(&self, session: &McpSession) -> Result<Vec<ToolDescriptor>> {
        let provider = session.provider();
        let listed = tokio::time::timeout(self.options.list_timeout, session.list_tools()).await;
        let failure = match listed {
            Ok(Ok(tools)) if !tools.is_empty() => return Ok(tools),
            Ok(Ok(_)) => McpError::protocol(provider, "provider declared no tools"),
            Ok(Err(e)) => e,
            Err(_) => McpError::Timeout {
                provider: provider.to_string(),
                operation: "tools/list".into(),
            },
        };

        if let Err(e) = session.close().await {
            debug!(provider = %provider, "Close after failed listing: {}", e);
        }
        Err(failure)
    }
}

async fn close_all(sessions: &[Arc<McpSession>]) {
    let results = join_all(sessions.iter().map(|s| s.close())).await;
    for (session, result) in sessions.iter().zip(results) {
        if let Err(e) = result {
            debug!(provider = %session.provider(), "Session close failed: {}", e);
        }
    }
}
