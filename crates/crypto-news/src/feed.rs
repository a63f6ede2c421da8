//! News Feed Integration
//!
//! [`FeedSource`] abstracts the paginated upstream; [`CryptoPanicClient`] is
//! the real one. [`collect_news`] walks the pages and stops at the first
//! page that yields nothing, failed fetches included.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::NewsConfig;
use crate::error::{NewsError, Result};
use crate::model::{FeedPage, NewsItem};

/// A paginated news feed (Strategy pattern)
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one page, numbered from 1
    async fn fetch_page(&self, page: u32) -> Result<Vec<NewsItem>>;

    /// Feed name for logs
    fn name(&self) -> &str;
}

/// Outcome of asking for one page
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    Items(Vec<NewsItem>),
    /// No items, or the fetch failed: either way pagination ends here
    Empty,
}

impl Page {
    /// Fetch one page, folding failures into [`Page::Empty`]
    pub async fn fetch(source: &dyn FeedSource, page: u32) -> Self {
        match source.fetch_page(page).await {
            Ok(items) if items.is_empty() => Self::Empty,
            Ok(items) => Self::Items(items),
            Err(e) => {
                warn!(feed = %source.name(), "Error fetching page {}: {}", page, e);
                Self::Empty
            }
        }
    }
}

/// Fetch pages `1..=max_pages`, stopping at the first empty one
pub async fn collect_news(source: &dyn FeedSource, max_pages: u32) -> Vec<NewsItem> {
    let mut all_news = Vec::new();

    for page in 1..=max_pages {
        match Page::fetch(source, page).await {
            Page::Items(items) => all_news.extend(items),
            Page::Empty => {
                info!("No more news found on page {}. Stopping.", page);
                break;
            }
        }
    }

    info!("Total news items fetched: {}", all_news.len());
    all_news
}

/// CryptoPanic posts API client
pub struct CryptoPanicClient {
    http: reqwest::Client,
    config: NewsConfig,
}

impl CryptoPanicClient {
    pub fn new(config: NewsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("crypto-news/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub const fn config(&self) -> &NewsConfig {
        &self.config
    }
}

#[async_trait]
impl FeedSource for CryptoPanicClient {
    async fn fetch_page(&self, page: u32) -> Result<Vec<NewsItem>> {
        let api_key = self.config.api_key.as_deref().ok_or(NewsError::MissingApiKey)?;

        info!("Fetching page {} from CryptoPanic API...", page);
        let page_number = page.to_string();
        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[
                ("auth_token", api_key),
                ("kind", "news"),
                ("regions", "en"),
                ("page", page_number.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Status(status));
        }

        let body = response.text().await?;
        let feed: FeedPage = serde_json::from_str(&body)?;
        info!("Got {} news items from page {}", feed.results.len(), page);
        Ok(feed.results)
    }

    fn name(&self) -> &str {
        "cryptopanic"
    }
}
