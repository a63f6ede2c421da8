//! News provider configuration

use std::time::Duration;

pub const API_KEY_ENV: &str = "CRYPTOPANIC_API_KEY";
pub const BASE_URL_ENV: &str = "CRYPTOPANIC_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://cryptopanic.com/api/v1/posts/";

/// Pages requested per tool call
pub const MAX_PAGES: u32 = 3;

/// Items rendered into one digest
pub const DIGEST_LIMIT: usize = 20;

#[derive(Clone, Debug)]
pub struct NewsConfig {
    /// CryptoPanic auth token; every fetch fails without it
    pub api_key: Option<String>,

    /// Posts endpoint
    pub base_url: String,

    pub max_pages: u32,

    pub digest_limit: usize,

    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            max_pages: MAX_PAGES,
            digest_limit: DIGEST_LIMIT,
            timeout: Duration::from_secs(30),
        }
    }
}

impl NewsConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            api_key,
            base_url,
            ..Default::default()
        }
    }

    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
