//! Error Types for the News Feed

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewsError>;

/// Failure to fetch one page of the feed.
///
/// None of these are fatal for a tool call: pagination treats every
/// failure as the end of the feed.
#[derive(Error, Debug)]
pub enum NewsError {
    #[error("CRYPTOPANIC_API_KEY not set")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Undecodable feed page: {0}")]
    Decode(#[from] serde_json::Error),
}
