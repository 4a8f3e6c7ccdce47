pub mod json_feed;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{Result, TidingsError};
use crate::domain::FeedItem;

use json_feed::JsonFeed;

/// Turns a fetched feed document into items sorted newest-first.
#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<FeedItem>> {
        let mut items = match JsonFeed::detect(body) {
            Some(feed) => feed
                .items
                .into_iter()
                .map(|entry| entry.into_item(fetched_at))
                .collect(),
            None => self.normalize_xml(body, fetched_at)?,
        };

        // Stable sort keeps document order among equal timestamps.
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(items)
    }

    fn normalize_xml(&self, body: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<FeedItem>> {
        // Leave missing ids empty so `external_id_for` hashes the content.
        // The parser's own fallback is random for entries without a link.
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(body)
            .map_err(|e| TidingsError::FeedParse(e.to_string()))?;

        let items = feed
            .entries
            .into_iter()
            .map(|entry| {
                let title = entry
                    .title
                    .map(|t| decode_html_entities(&t.content).to_string());
                let link = entry.links.first().map(|l| l.href.clone());
                let published = entry.published.or(entry.updated);
                // feed-rs keeps only the parsed timestamp, so hash its canonical form.
                let date_key = published.map(|dt| dt.to_rfc3339());

                let external_id = FeedItem::external_id_for(
                    Some(entry.id.as_str()),
                    title.as_deref(),
                    link.as_deref(),
                    date_key.as_deref(),
                );

                let mut item = FeedItem::new(external_id, published.unwrap_or(fetched_at));
                item.fetched_at = fetched_at;
                item.date_inferred = published.is_none();
                item.title = title;
                item.link = link;
                item.author = entry.authors.first().map(|a| a.name.clone());
                item.summary = entry
                    .summary
                    .map(|s| decode_html_entities(&s.content).to_string());
                item.content = entry
                    .content
                    .and_then(|c| c.body)
                    .map(|b| decode_html_entities(&b).to_string());
                item
            })
            .collect();

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <description>A test feed</description>
    <item>
      <title>Older Item</title>
      <link>https://example.com/item1</link>
      <guid>item-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is item 1</description>
    </item>
    <item>
      <title>Newer Item &amp; More</title>
      <link>https://example.com/item2</link>
      <guid>item-2</guid>
      <pubDate>Tue, 02 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is item 2</description>
    </item>
  </channel>
</rss>"#;

    const JSON_SAMPLE: &str = r#"{
  "version": "https://jsonfeed.org/version/1.1",
  "title": "Test Feed",
  "items": [
    {
      "id": "item-1",
      "url": "https://example.com/item1",
      "title": "Older Item",
      "content_text": "This is item 1",
      "date_published": "2024-01-01T00:00:00Z"
    },
    {
      "id": "item-2",
      "url": "https://example.com/item2",
      "title": "Newer Item &amp; More",
      "content_text": "This is item 2",
      "date_published": "2024-01-02T00:00:00Z"
    }
  ]
}"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test Feed</title>
  <entry>
    <title>Atom Entry 1</title>
    <link href="https://example.com/atom1"/>
    <id>atom-entry-1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <author><name>Jane</name></author>
    <summary>This is Atom entry 1</summary>
  </entry>
</feed>"#;

    const UNDATED_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Undated</title>
    <item>
      <title>No Date</title>
      <link>https://example.com/nodate</link>
      <guid>nodate</guid>
    </item>
  </channel>
</rss>"#;

    const GUIDLESS_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>No Guids</title>
    <item>
      <title>Linked</title>
      <link>https://example.com/linked</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Bare</title>
      <description>No link, no guid, no date</description>
    </item>
  </channel>
</rss>"#;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rss_sorted_newest_first() {
        let items = Normalizer::new()
            .normalize(RSS_SAMPLE.as_bytes(), fetched_at())
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].external_id, "item-2");
        assert_eq!(items[0].title.as_deref(), Some("Newer Item & More"));
        assert_eq!(
            items[0].published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(items[1].external_id, "item-1");
    }

    #[test]
    fn test_atom_uses_updated_and_author() {
        let items = Normalizer::new()
            .normalize(ATOM_SAMPLE.as_bytes(), fetched_at())
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/atom1"));
        assert_eq!(items[0].author.as_deref(), Some("Jane"));
        assert!(!items[0].date_inferred);
    }

    #[test]
    fn test_json_feed_and_rss_agree() {
        let normalizer = Normalizer::new();
        let rss = normalizer.normalize(RSS_SAMPLE.as_bytes(), fetched_at()).unwrap();
        let json = normalizer.normalize(JSON_SAMPLE.as_bytes(), fetched_at()).unwrap();

        let key = |items: &[FeedItem]| {
            items
                .iter()
                .map(|i| (i.title.clone(), i.link.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(key(&rss), key(&json));
        assert_eq!(rss[0].published_at, json[0].published_at);
    }

    #[test]
    fn test_missing_date_falls_back_to_fetch_time() {
        let items = Normalizer::new()
            .normalize(UNDATED_RSS.as_bytes(), fetched_at())
            .unwrap();

        assert_eq!(items[0].published_at, fetched_at());
        assert!(items[0].date_inferred);
    }

    #[test]
    fn test_empty_channel_yields_no_items() {
        let body = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        let items = Normalizer::new().normalize(body.as_bytes(), fetched_at()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let result = Normalizer::new().normalize(b"definitely not a feed", fetched_at());
        assert!(matches!(result, Err(TidingsError::FeedParse(_))));
    }

    #[test]
    fn test_entries_without_guid_get_stable_content_hash() {
        let normalizer = Normalizer::new();
        let first = normalizer
            .normalize(GUIDLESS_RSS.as_bytes(), fetched_at())
            .unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
        let second = normalizer.normalize(GUIDLESS_RSS.as_bytes(), later).unwrap();

        let linked = first
            .iter()
            .find(|i| i.title.as_deref() == Some("Linked"))
            .unwrap();
        let published = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            linked.external_id,
            FeedItem::content_hash("Linked", "https://example.com/linked", &published.to_rfc3339())
        );

        let ids = |items: &[FeedItem]| {
            let mut ids: Vec<_> = items.iter().map(|i| i.external_id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&first), ids(&second));

        let bare = first
            .iter()
            .find(|i| i.title.as_deref() == Some("Bare"))
            .unwrap();
        assert_eq!(bare.external_id, FeedItem::content_hash("Bare", "", ""));
    }
}
