use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::error::{Result, TidingsError};
use crate::cache::FreshnessCache;
use crate::config::Config;
use crate::engine::{DispatchContext, EngineConfig};
use crate::fetcher::{FeedReader, Fetcher, HttpFetcher};
use crate::notifier::{ConsoleNotifier, Notifier, WebhookNotifier};
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub reader: FeedReader,
    pub notifier: Arc<dyn Notifier + Send + Sync>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.storage.database.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let engine = config.engine.to_engine_config();
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::with_timeout(engine.fetch_timeout)?);
        let reader = FeedReader::new(fetcher);

        let notifier: Arc<dyn Notifier + Send + Sync> = match &config.notifier.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), engine.delivery_timeout)?),
            None => Arc::new(ConsoleNotifier::new()),
        };

        Ok(Self {
            config,
            store,
            reader,
            notifier,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.config.engine.to_engine_config()
    }

    pub fn dispatch_context(&self) -> Arc<DispatchContext> {
        Arc::new(DispatchContext {
            subscriptions: self.store.clone(),
            sources: self.store.clone(),
            reader: self.reader.clone(),
            notifier: self.notifier.clone(),
        })
    }

    /// Cache for the configured headline feed, if one is set.
    pub fn headline_cache(&self) -> Option<FreshnessCache> {
        self.config.headline.url.as_ref().map(|url| {
            FreshnessCache::new(
                self.reader.clone(),
                url.clone(),
                Duration::from_secs(self.config.headline.refresh_secs),
            )
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TidingsError::Config("Could not find data directory".into()))?;
        let tidings_dir = data_dir.join("tidings");
        std::fs::create_dir_all(&tidings_dir)?;
        Ok(tidings_dir.join("tidings.db"))
    }
}
