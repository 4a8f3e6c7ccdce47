//! JSON Feed (1.0 / 1.1) field mapping.

use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::FeedItem;

pub const VERSION_PREFIX: &str = "https://jsonfeed.org/version/";

#[derive(Debug, Deserialize)]
pub struct JsonFeed {
    pub version: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<JsonFeedItem>,
}

#[derive(Debug, Deserialize)]
pub struct JsonFeedItem {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content_html: Option<String>,
    #[serde(default)]
    pub content_text: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub author: Option<JsonFeedAuthor>,
    #[serde(default)]
    pub authors: Vec<JsonFeedAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct JsonFeedAuthor {
    #[serde(default)]
    pub name: Option<String>,
}

impl JsonFeed {
    /// Parse `body` as a JSON Feed. Returns `None` when it is not JSON or
    /// does not declare a JSON Feed version.
    pub fn detect(body: &[u8]) -> Option<Self> {
        let first = body.iter().find(|b| !b.is_ascii_whitespace())?;
        if *first != b'{' {
            return None;
        }

        let feed: JsonFeed = serde_json::from_slice(body).ok()?;
        feed.version.starts_with(VERSION_PREFIX).then_some(feed)
    }
}

impl JsonFeedItem {
    pub fn into_item(self, fetched_at: DateTime<Utc>) -> FeedItem {
        let native_id = match &self.id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let link = self.url.or(self.external_url);
        let published = self
            .date_published
            .as_deref()
            .and_then(parse_date)
            .or_else(|| self.date_modified.as_deref().and_then(parse_date));
        let raw_date = self.date_published.or(self.date_modified);

        let external_id = FeedItem::external_id_for(
            native_id.as_deref(),
            self.title.as_deref(),
            link.as_deref(),
            raw_date.as_deref(),
        );

        let mut item = FeedItem::new(external_id, published.unwrap_or(fetched_at));
        item.fetched_at = fetched_at;
        item.date_inferred = published.is_none();
        item.title = self.title.map(|t| decode_html_entities(&t).to_string());
        item.link = link;
        item.author = self
            .authors
            .into_iter()
            .chain(self.author)
            .find_map(|a| a.name);
        item.summary = self.summary.map(|s| decode_html_entities(&s).to_string());
        item.content = self.content_html.or(self.content_text);
        item
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
