//! Digest formatting

use std::fmt::Write as _;

use crate::model::NewsItem;

/// Returned when the feed produced nothing
pub const NO_NEWS: &str = "No crypto news available at the moment.";

/// Characters shown by the `test` command before truncating
pub const PREVIEW_CHARS: usize = 500;

/// Render up to `limit` items as a numbered, human-readable digest
pub fn format_digest(items: &[NewsItem], limit: usize) -> String {
    if items.is_empty() {
        return NO_NEWS.to_string();
    }

    let mut digest = String::from("Latest Cryptocurrency News:\n\n");
    for (idx, item) in items.iter().take(limit).enumerate() {
        let _ = writeln!(digest, "{}. {}", idx + 1, item.display_title());
        if let Some(published) = item.timestamp() {
            let _ = writeln!(digest, "   Published: {published}");
        }
        if let Some(url) = item.link() {
            let _ = writeln!(digest, "   URL: {url}");
        }
        digest.push('\n');
    }

    digest.trim().to_string()
}

/// First `max_chars` characters, with `...` appended when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_items_placeholder() {
        assert_eq!(format_digest(&[], 20), "No crypto news available at the moment.");
    }

    #[test]
    fn test_entry_layout() {
        let items = vec![
            NewsItem::new("BTC breaks out")
                .published("2025-06-01T10:00:00Z")
                .with_url("https://example.com/a"),
            NewsItem::default(),
        ];
        assert_eq!(
            format_digest(&items, 20),
            "Latest Cryptocurrency News:\n\n\
             1. BTC breaks out\n   Published: 2025-06-01T10:00:00Z\n   URL: https://example.com/a\n\n\
             2. No Title"
        );
    }

    #[test]
    fn test_caps_entries() {
        let items: Vec<_> = (1..=25).map(|i| NewsItem::new(format!("item {i}"))).collect();
        let digest = format_digest(&items, 20);
        assert!(digest.contains("20. item 20"));
        assert!(!digest.contains("21."));
        assert_eq!(digest.lines().filter(|l| l.contains(". item ")).count(), 20);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 500), "short");
        let long = "é".repeat(600);
        let cut = preview(&long, 500);
        assert_eq!(cut.chars().count(), 503);
        assert!(cut.ends_with("..."));
    }
}
