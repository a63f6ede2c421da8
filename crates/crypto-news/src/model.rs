//! Feed domain types

use serde::{Deserialize, Serialize};

/// One post from the upstream feed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub published_at: Option<String>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn published(mut self, timestamp: impl Into<String>) -> Self {
        self.published_at = Some(timestamp.into());
        self
    }

    /// Title, or `No Title` when missing
    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_ref()).unwrap_or("No Title")
    }

    pub fn link(&self) -> Option<&str> {
        non_empty(self.url.as_ref())
    }

    pub fn timestamp(&self) -> Option<&str> {
        non_empty(self.published_at.as_ref())
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Body of one feed page
#[derive(Debug, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub results: Vec<NewsItem>,
}
