pub mod http_fetcher;
pub mod reader;

use async_trait::async_trait;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;
pub use reader::FeedReader;

/// Retrieves the raw bytes of a feed document.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
