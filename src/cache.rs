//! Time-bounded cache for the newest item of a single source.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::FeedItem;
use crate::fetcher::FeedReader;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

struct Cached {
    item: FeedItem,
    stored_at: Instant,
}

/// Serves the latest item of one feed, fetching at most once per interval.
///
/// Refills happen under the lock, so concurrent callers on a miss wait for
/// the single in-flight fetch instead of issuing their own. A failed refill
/// keeps the previous value and returns it.
pub struct FreshnessCache {
    reader: FeedReader,
    url: String,
    interval: Duration,
    slot: Mutex<Option<Cached>>,
}

impl FreshnessCache {
    pub fn new(reader: FeedReader, url: impl Into<String>, interval: Duration) -> Self {
        Self {
            reader,
            url: url.into(),
            interval,
            slot: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn get(&self) -> Option<FeedItem> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.stored_at.elapsed() < self.interval {
                return Some(cached.item.clone());
            }
        }

        match self.reader.fetch_latest(&self.url).await {
            Ok(Some(item)) => {
                *slot = Some(Cached {
                    item: item.clone(),
                    stored_at: Instant::now(),
                });
                Some(item)
            }
            Ok(None) => {
                debug!("Feed {} returned no entries, keeping cached item", self.url);
                slot.as_ref().map(|c| c.item.clone())
            }
            Err(e) => {
                warn!("Failed to refresh {}: {}", self.url, e);
                slot.as_ref().map(|c| c.item.clone())
            }
        }
    }
}
