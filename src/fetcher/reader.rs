use std::sync::Arc;

use chrono::Utc;

use crate::app::Result;
use crate::domain::FeedItem;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;

/// Fetches a source and hands back normalized items, newest first.
///
/// Every failure (network, HTTP status, parse) comes back as `Err`; callers
/// decide whether it matters. An empty `Ok` means the feed parsed but had no
/// entries, which is not the same as "nothing new".
#[derive(Clone)]
pub struct FeedReader {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
}

impl FeedReader {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
        }
    }

    pub async fn fetch_all(&self, url: &str) -> Result<Vec<FeedItem>> {
        let body = self.fetcher.fetch(url).await?;
        self.normalizer.normalize(&body, Utc::now())
    }

    pub async fn fetch_latest(&self, url: &str) -> Result<Option<FeedItem>> {
        Ok(self.fetch_all(url).await?.into_iter().next())
    }
}
