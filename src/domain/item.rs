use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One feed entry in dialect-independent form.
///
/// Produced fresh on every fetch and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub external_id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub fetched_at: DateTime<Utc>,
    /// Set when the entry carried no usable date and `published_at` is the fetch time.
    pub date_inferred: bool,
}

impl FeedItem {
    pub fn new(external_id: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            external_id: external_id.into(),
            title: None,
            link: None,
            author: None,
            published_at,
            summary: None,
            content: None,
            fetched_at: Utc::now(),
            date_inferred: false,
        }
    }

    /// Pick the entry's own id, or hash title, link and raw date string when it has none.
    pub fn external_id_for(
        native_id: Option<&str>,
        title: Option<&str>,
        link: Option<&str>,
        published: Option<&str>,
    ) -> String {
        match native_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Self::content_hash(
                title.unwrap_or_default(),
                link.unwrap_or_default(),
                published.unwrap_or_default(),
            ),
        }
    }

    pub fn content_hash(title: &str, link: &str, published: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(link.as_bytes());
        hasher.update(published.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    /// Summary if present, otherwise the full content.
    pub fn display_summary(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.content.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_id_wins() {
        let id = FeedItem::external_id_for(Some("guid-1"), Some("t"), Some("l"), None);
        assert_eq!(id, "guid-1");
    }

    #[test]
    fn test_blank_native_id_falls_back_to_hash() {
        let id = FeedItem::external_id_for(Some("  "), Some("t"), Some("l"), Some("p"));
        assert_eq!(id, FeedItem::content_hash("t", "l", "p"));
    }

    #[test]
    fn test_content_hash_deterministic() {
        let a = FeedItem::content_hash("Title", "https://example.com/a", "2024-01-01");
        let b = FeedItem::content_hash("Title", "https://example.com/a", "2024-01-01");
        let c = FeedItem::content_hash("Title", "https://example.com/b", "2024-01-01");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_display_title_without_title() {
        let item = FeedItem::new("e1", Utc::now());
        assert_eq!(item.display_title(), "(Untitled)");
    }

    #[test]
    fn test_display_summary_falls_back_to_content() {
        let mut item = FeedItem::new("e1", Utc::now());
        item.content = Some("Full content".into());
        assert_eq!(item.display_summary(), "Full content");
        item.summary = Some("Short summary".into());
        assert_eq!(item.display_summary(), "Short summary");
    }
}
