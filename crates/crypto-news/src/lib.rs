//! # crypto-news
//!
//! A tool provider exposing one tool, `get_crypto_news`, which pages
//! through the CryptoPanic feed and returns a readable digest.
//!
//! The binary serves it over stdio with [`agent_mcp::McpServer`]; the
//! `test` subcommand runs the pipeline once and prints a preview.

pub mod config;
pub mod digest;
pub mod error;
pub mod feed;
pub mod model;
pub mod tool;

pub use config::NewsConfig;
pub use digest::{NO_NEWS, format_digest, preview};
pub use error::{NewsError, Result};
pub use feed::{CryptoPanicClient, FeedSource, Page, collect_news};
pub use model::NewsItem;
pub use tool::NewsTool;
