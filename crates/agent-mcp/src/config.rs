//! Provider Descriptor Set
//!
//! Static description of every tool provider the agent may use and how to
//! launch it. Loaded once at startup, never mutated afterwards.
//!
//! ```toml
//! [[providers]]
//! name = "crypto_news"
//! command = "crypto-news"
//! args = []
//! transport = "stdio"
//! required_env = ["CRYPTOPANIC_API_KEY"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// Environment variable pointing at a provider configuration file
pub const SERVERS_CONFIG_ENV: &str = "MCP_SERVERS_CONFIG";

/// How to talk to a launched provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC over the child's stdin/stdout
    #[default]
    Stdio,
}

/// Everything needed to start a provider process
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable to run
    pub command: String,

    /// Command-line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Transport used once the process is running
    #[serde(default)]
    pub transport: TransportKind,

    /// Extra environment for the child, on top of the inherited one
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Variables that must be set (non-empty) before launching
    #[serde(default)]
    pub required_env: Vec<String>,

    /// Working directory for the child
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn stdio(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            transport: TransportKind::Stdio,
            env: BTreeMap::new(),
            required_env: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn require_env(mut self, var: impl Into<String>) -> Self {
        self.required_env.push(var.into());
        self
    }
}

/// One named tool provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique key
    pub name: String,

    #[serde(flatten)]
    pub launch: LaunchSpec,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, launch: LaunchSpec) -> Self {
        Self {
            name: name.into(),
            launch,
        }
    }

    /// Check that this provider can be launched at all.
    ///
    /// Failures name the provider so the caller can skip exactly this one.
    pub fn validate(&self) -> Result<()> {
        if self.launch.command.trim().is_empty() {
            return Err(McpError::config(&self.name, "launch command is empty"));
        }

        let missing: Vec<&str> = self
            .launch
            .required_env
            .iter()
            .filter(|var| {
                self.launch.env.get(var.as_str()).is_none_or(String::is_empty)
                    && std::env::var(var.as_str()).map_or(true, |v| v.is_empty())
            })
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(McpError::config(
                &self.name,
                format!("missing required environment: {}", missing.join(", ")),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    providers: Vec<ProviderDescriptor>,
}

/// Ordered, name-unique set of providers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderDescriptorSet {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderDescriptorSet {
    /// Build a set, rejecting blank or duplicate names
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for provider in &providers {
            if provider.name.trim().is_empty() {
                return Err(McpError::config("<unnamed>", "provider name is empty"));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(McpError::config(&provider.name, "duplicate provider name"));
            }
        }
        Ok(Self { providers })
    }

    /// Parse a TOML document with a `[[providers]]` array
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        Self::new(file.providers)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loading provider configuration");
        Self::from_toml_str(&content)
    }

    /// Explicit path, then `MCP_SERVERS_CONFIG`, then the built-in set
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var(SERVERS_CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::builtin()),
        }
    }

    /// The providers shipped with this workspace plus the stock-price server
    pub fn builtin() -> Self {
        Self {
            providers: vec![
                ProviderDescriptor::new(
                    "crypto_news",
                    LaunchSpec::stdio(sibling_binary("crypto-news"), &[])
                        .require_env("CRYPTOPANIC_API_KEY"),
                ),
                ProviderDescriptor::new(
                    "yfinanceserver",
                    LaunchSpec::stdio("uv", &["run", "server.py"]),
                ),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProviderDescriptor> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProviderDescriptorSet {
    type Item = &'a ProviderDescriptor;
    type IntoIter = std::slice::Iter<'a, ProviderDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.providers.iter()
    }
}

/// Prefer a binary installed next to the current executable
fn sibling_binary(name: &str) -> String {
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(name))
        .filter(|path| path.exists())
        .map_or_else(|| name.to_string(), |path| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let set = ProviderDescriptorSet::from_toml_str(
            r#"
            [[providers]]
            name = "crypto_news"
            command = "crypto-news"
            required_env = ["CRYPTOPANIC_API_KEY"]

            [[providers]]
            name = "yfinanceserver"
            command = "uv"
            args = ["run", "server.py"]
            transport = "stdio"

            [providers.env]
            PYTHONUNBUFFERED = "1"
            "#,
        )
        .unwrap();

        assert_eq!(set.names(), vec!["crypto_news", "yfinanceserver"]);
        let yf = set.get("yfinanceserver").unwrap();
        assert_eq!(yf.launch.args, vec!["run", "server.py"]);
        assert_eq!(yf.launch.transport, TransportKind::Stdio);
        assert_eq!(yf.launch.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert!(set.get("crypto_news").unwrap().launch.args.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ProviderDescriptorSet::new(vec![
            ProviderDescriptor::new("a", LaunchSpec::stdio("x", &[])),
            ProviderDescriptor::new("a", LaunchSpec::stdio("y", &[])),
        ])
        .unwrap_err();
        assert!(matches!(err, McpError::Config { provider, .. } if provider == "a"));
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let result = ProviderDescriptorSet::from_toml_str(
            r#"
            [[providers]]
            name = "web"
            command = "srv"
            transport = "websocket"
            "#,
        );
        assert!(matches!(result, Err(McpError::Toml(_))));
    }

    #[test]
    fn test_validate_missing_env_names_provider() {
        let descriptor = ProviderDescriptor::new(
            "news",
            LaunchSpec::stdio("crypto-news", &[]).require_env("AGENT_MCP_TEST_SURELY_UNSET_VAR"),
        );
        let err = descriptor.validate().unwrap_err();
        match err {
            McpError::Config { provider, message } => {
                assert_eq!(provider, "news");
                assert!(message.contains("AGENT_MCP_TEST_SURELY_UNSET_VAR"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_env_from_descriptor() {
        let mut launch = LaunchSpec::stdio("srv", &[]).require_env("AGENT_MCP_TEST_INLINE_VAR");
        launch
            .env
            .insert("AGENT_MCP_TEST_INLINE_VAR".into(), "set".into());
        assert!(ProviderDescriptor::new("p", launch).validate().is_ok());
    }

    #[test]
    fn test_validate_empty_command() {
        let descriptor = ProviderDescriptor::new("p", LaunchSpec::stdio("  ", &[]));
        assert!(matches!(descriptor.validate(), Err(McpError::Config { .. })));
    }

    #[test]
    fn test_builtin_order() {
        let set = ProviderDescriptorSet::builtin();
        assert_eq!(set.names(), vec!["crypto_news", "yfinanceserver"]);
        assert_eq!(
            set.get("crypto_news").unwrap().launch.required_env,
            vec!["CRYPTOPANIC_API_KEY"]
        );
    }
}
