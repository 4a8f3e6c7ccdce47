pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Source, Subscriber, Subscription};

pub use sqlite::SqliteStore;

/// Administrative catalogue of feeds.
pub trait SourceRegistry {
    fn add_source(&self, source: &Source) -> Result<i64>;
    fn get_source(&self, id: i64) -> Result<Option<Source>>;
    fn get_source_by_url(&self, url: &str) -> Result<Option<Source>>;
    fn list_sources(&self) -> Result<Vec<Source>>;
    /// Deleting a source drops every subscription to it.
    fn delete_source(&self, id: i64) -> Result<()>;
}

/// Who follows which source, and how far each has been dispatched.
pub trait SubscriptionRegistry {
    // Subscriber operations
    fn ensure_subscriber(&self, id: i64) -> Result<Subscriber>;
    fn get_subscriber(&self, id: i64) -> Result<Option<Subscriber>>;

    // Subscription operations
    fn subscribe(&self, subscriber_id: i64, source_id: i64) -> Result<Subscription>;
    fn unsubscribe(&self, subscriber_id: i64, source_id: i64) -> Result<bool>;
    fn set_active(&self, subscriber_id: i64, source_id: i64, active: bool) -> Result<bool>;
    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>>;
    fn list_subscriptions_for(&self, subscriber_id: i64) -> Result<Vec<Subscription>>;

    // Dispatch operations
    fn list_active_subscriptions(&self) -> Result<Vec<Subscription>>;
    /// Move the watermark forward. Returns `false` when the stored value is
    /// already at or past `ts`; watermarks never move backwards.
    fn advance_watermark(&self, subscription_id: i64, ts: DateTime<Utc>) -> Result<bool>;
}
