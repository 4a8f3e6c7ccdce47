use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::domain::FeedItem;
use crate::notifier::OutgoingMessage;

pub const MAX_SUMMARY_CHARS: usize = 500;

/// Render an item as the HTML message subscribers receive.
///
/// Empty parts are dropped; the summary is cut to [`MAX_SUMMARY_CHARS`].
pub fn format_item(item: &FeedItem) -> OutgoingMessage {
    let title = item
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("No title");
    let author = item
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("Unknown");
    let link = item.link.as_deref().filter(|l| !l.trim().is_empty());
    let summary = truncate(item.display_summary().trim(), MAX_SUMMARY_CHARS);

    let parts = [
        format!("<b>{}</b>", encode_text(title)),
        link.map(|l| {
            format!(
                "<a href=\"{}\">Read on site</a>",
                encode_double_quoted_attribute(l)
            )
        })
        .unwrap_or_default(),
        format!("<i>{}</i>", encode_text(author)),
        item.published_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        encode_text(&summary).to_string(),
    ];

    let text = parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    OutgoingMessage {
        title: title.to_string(),
        link: link.map(String::from),
        text,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
