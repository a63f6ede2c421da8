//! The `get_crypto_news` tool

use std::sync::Arc;

use agent_mcp::{CallToolResult, McpTool, ToolHandler};
use async_trait::async_trait;
use tracing::info;

use crate::digest::format_digest;
use crate::feed::{FeedSource, collect_news};

pub const TOOL_NAME: &str = "get_crypto_news";
pub const TOOL_DESCRIPTION: &str = "Fetch the latest cryptocurrency news from CryptoPanic API";

/// Serves the news digest as an MCP tool
pub struct NewsTool {
    source: Arc<dyn FeedSource>,
    max_pages: u32,
    digest_limit: usize,
}

impl NewsTool {
    pub fn new(source: Arc<dyn FeedSource>, max_pages: u32, digest_limit: usize) -> Self {
        Self {
            source,
            max_pages,
            digest_limit,
        }
    }

    /// Fetch and format one digest
    pub async fn digest(&self) -> String {
        info!("Fetching crypto news...");
        let news = collect_news(self.source.as_ref(), self.max_pages).await;
        let readable = format_digest(&news, self.digest_limit);
        info!("Returned {} news items", news.len());
        readable
    }
}

#[async_trait]
impl ToolHandler for NewsTool {
    fn tools(&self) -> Vec<McpTool> {
        vec![McpTool {
            name: TOOL_NAME.into(),
            description: Some(TOOL_DESCRIPTION.into()),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }]
    }

    async fn call(&self, name: &str, _arguments: serde_json::Value) -> CallToolResult {
        if name != TOOL_NAME {
            return CallToolResult::error(format!("Unknown tool: {name}"));
        }
        CallToolResult::success(self.digest().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::NO_NEWS;
    use crate::error::{NewsError, Result};
    use crate::model::NewsItem;

    struct OnePage(Vec<NewsItem>);

    #[async_trait]
    impl FeedSource for OnePage {
        async fn fetch_page(&self, page: u32) -> Result<Vec<NewsItem>> {
            Ok(if page == 1 { self.0.clone() } else { Vec::new() })
        }

        fn name(&self) -> &str {
            "one-page"
        }
    }

    struct Down;

    #[async_trait]
    impl FeedSource for Down {
        async fn fetch_page(&self, _page: u32) -> Result<Vec<NewsItem>> {
            Err(NewsError::MissingApiKey)
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    #[test]
    fn test_catalog() {
        let tool = NewsTool::new(Arc::new(Down), 3, 20);
        let tools = tool.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_crypto_news");
        assert_eq!(
            tools[0].description.as_deref(),
            Some("Fetch the latest cryptocurrency news from CryptoPanic API")
        );
    }

    #[tokio::test]
    async fn test_call_returns_digest() {
        let tool = NewsTool::new(Arc::new(OnePage(vec![NewsItem::new("ETH ships")])), 3, 20);
        let result = tool.call(TOOL_NAME, serde_json::json!({})).await;
        assert!(!result.is_error);
        assert!(result.to_text().contains("1. ETH ships"));
    }

    #[tokio::test]
    async fn test_feed_outage_is_not_an_error() {
        let tool = NewsTool::new(Arc::new(Down), 3, 20);
        let result = tool.call(TOOL_NAME, serde_json::json!({})).await;
        assert!(!result.is_error);
        assert_eq!(result.to_text(), NO_NEWS);
    }
}
