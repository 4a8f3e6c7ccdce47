use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TidingsError};
use crate::domain::{Source, Subscriber, Subscription, Watermark};
use crate::store::{SourceRegistry, SubscriptionRegistry};

const SUBSCRIPTION_COLUMNS: &str =
    "id, subscriber_id, source_id, watermark, active, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| TidingsError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TidingsError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        Watermark::decode(s)
    }

    fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
        Ok(Source {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            created_at: row
                .get::<_, String>(3)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
        let id: i64 = row.get(0)?;
        let watermark = match row.get::<_, Option<String>>(3)? {
            None => Watermark::unset(),
            Some(raw) => match Self::parse_datetime(&raw) {
                Some(ts) => Watermark::at(ts),
                None => {
                    tracing::warn!(
                        "Subscription {} has unreadable watermark {:?}, treating as unset",
                        id,
                        raw
                    );
                    Watermark::unset()
                }
            },
        };

        Ok(Subscription {
            id,
            subscriber_id: row.get(1)?,
            source_id: row.get(2)?,
            watermark,
            active: row.get(4)?,
            created_at: row
                .get::<_, String>(5)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn insert_subscriber(conn: &Connection, id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO subscribers (id, created_at) VALUES (?1, ?2)",
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn find_subscription(
        conn: &Connection,
        subscriber_id: i64,
        source_id: i64,
    ) -> Result<Option<Subscription>> {
        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM subscriptions WHERE subscriber_id = ?1 AND source_id = ?2",
                    SUBSCRIPTION_COLUMNS
                ),
                params![subscriber_id, source_id],
                Self::subscription_from_row,
            )
            .optional()?;

        Ok(result)
    }
}

impl SourceRegistry for SqliteStore {
    fn add_source(&self, source: &Source) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO sources (name, url, created_at) VALUES (?1, ?2, ?3)",
            params![source.name, source.url, source.created_at.to_rfc3339()],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_source(&self, id: i64) -> Result<Option<Source>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT id, name, url, created_at FROM sources WHERE id = ?1",
                params![id],
                Self::source_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT id, name, url, created_at FROM sources WHERE url = ?1",
                params![url],
                Self::source_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_sources(&self) -> Result<Vec<Source>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT id, name, url, created_at FROM sources ORDER BY id")?;
        let sources = stmt
            .query_map([], Self::source_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sources)
    }

    fn delete_source(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl SubscriptionRegistry for SqliteStore {
    fn ensure_subscriber(&self, id: i64) -> Result<Subscriber> {
        let conn = self.conn()?;
        Self::insert_subscriber(&conn, id)?;

        let created_at: String = conn.query_row(
            "SELECT created_at FROM subscribers WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        Ok(Subscriber {
            id,
            created_at: Self::parse_datetime(&created_at).unwrap_or_else(Utc::now),
        })
    }

    fn get_subscriber(&self, id: i64) -> Result<Option<Subscriber>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT id, created_at FROM subscribers WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Subscriber {
                        id: row.get(0)?,
                        created_at: row
                            .get::<_, String>(1)
                            .ok()
                            .and_then(|s| Self::parse_datetime(&s))
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;

        Ok(result)
    }

    fn subscribe(&self, subscriber_id: i64, source_id: i64) -> Result<Subscription> {
        let conn = self.conn()?;

        let source_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sources WHERE id = ?1)",
            params![source_id],
            |row| row.get(0),
        )?;
        if !source_exists {
            return Err(TidingsError::SourceNotFound(source_id.to_string()));
        }

        Self::insert_subscriber(&conn, subscriber_id)?;
        conn.execute(
            "INSERT INTO subscriptions (subscriber_id, source_id, active, created_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(subscriber_id, source_id) DO UPDATE SET active = 1",
            params![subscriber_id, source_id, Utc::now().to_rfc3339()],
        )?;

        Self::find_subscription(&conn, subscriber_id, source_id)?.ok_or_else(|| {
            TidingsError::SubscriptionNotFound(format!("{}/{}", subscriber_id, source_id))
        })
    }

    fn unsubscribe(&self, subscriber_id: i64, source_id: i64) -> Result<bool> {
        let conn = self.conn()?;

        let removed = conn.execute(
            "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND source_id = ?2",
            params![subscriber_id, source_id],
        )?;
        Ok(removed > 0)
    }

    fn set_active(&self, subscriber_id: i64, source_id: i64, active: bool) -> Result<bool> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE subscriptions SET active = ?1 WHERE subscriber_id = ?2 AND source_id = ?3",
            params![active, subscriber_id, source_id],
        )?;
        Ok(updated > 0)
    }

    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM subscriptions WHERE id = ?1", SUBSCRIPTION_COLUMNS),
                params![id],
                Self::subscription_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_subscriptions_for(&self, subscriber_id: i64) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM subscriptions WHERE subscriber_id = ?1 ORDER BY id",
            SUBSCRIPTION_COLUMNS
        ))?;
        let subscriptions = stmt
            .query_map(params![subscriber_id], Self::subscription_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    fn list_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM subscriptions WHERE active = 1 ORDER BY id",
            SUBSCRIPTION_COLUMNS
        ))?;
        let subscriptions = stmt
            .query_map([], Self::subscription_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    fn advance_watermark(&self, subscription_id: i64, ts: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;

        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT watermark FROM subscriptions WHERE id = ?1",
                params![subscription_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            return Ok(false);
        };

        // Compare as timestamps: older rows may carry offsets or other layouts
        // whose string order does not match time order.
        let current = stored
            .as_deref()
            .and_then(Self::parse_datetime)
            .map_or_else(Watermark::unset, Watermark::at);
        if !current.admits(ts) {
            return Ok(false);
        }

        conn.execute(
            "UPDATE subscriptions SET watermark = ?1 WHERE id = ?2",
            params![Watermark::encode(ts), subscription_id],
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn store_with_source() -> (SqliteStore, i64) {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .add_source(&Source::new("Example", "https://example.com/feed.xml"))
            .unwrap();
        (store, id)
    }

    #[test]
    fn test_add_and_get_source() {
        let (store, id) = store_with_source();

        let source = store.get_source(id).unwrap().unwrap();
        assert_eq!(source.name, "Example");
        assert_eq!(
            store
                .get_source_by_url("https://example.com/feed.xml")
                .unwrap()
                .map(|s| s.id),
            Some(id)
        );
        assert!(store.get_source(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_source_url_is_unique() {
        let (store, _) = store_with_source();
        let dup = store.add_source(&Source::new("Again", "https://example.com/feed.xml"));
        assert!(matches!(dup, Err(TidingsError::Database(_))));
    }

    #[test]
    fn test_subscribe_creates_subscriber_with_unset_watermark() {
        let (store, source_id) = store_with_source();

        let sub = store.subscribe(7, source_id).unwrap();
        assert_eq!(sub.subscriber_id, 7);
        assert!(sub.active);
        assert!(sub.watermark.is_unset());
        assert!(store.get_subscriber(7).unwrap().is_some());
    }

    #[test]
    fn test_subscribe_is_unique_per_pair() {
        let (store, source_id) = store_with_source();

        let first = store.subscribe(7, source_id).unwrap();
        store.set_active(7, source_id, false).unwrap();
        let second = store.subscribe(7, source_id).unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.active);
        assert_eq!(store.list_subscriptions_for(7).unwrap().len(), 1);
    }

    #[test]
    fn test_subscribe_unknown_source() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store.subscribe(7, 99);
        assert!(matches!(result, Err(TidingsError::SourceNotFound(_))));
    }

    #[test]
    fn test_inactive_subscriptions_are_not_listed() {
        let (store, source_id) = store_with_source();
        store.subscribe(1, source_id).unwrap();
        store.subscribe(2, source_id).unwrap();
        store.set_active(2, source_id, false).unwrap();

        let active = store.list_active_subscriptions().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].subscriber_id, 1);
    }

    #[test]
    fn test_watermark_only_moves_forward() {
        let (store, source_id) = store_with_source();
        let sub = store.subscribe(1, source_id).unwrap();

        assert!(store.advance_watermark(sub.id, ts(2)).unwrap());
        assert!(!store.advance_watermark(sub.id, ts(1)).unwrap());
        assert!(!store.advance_watermark(sub.id, ts(2)).unwrap());

        let stored = store.get_subscription(sub.id).unwrap().unwrap();
        assert_eq!(stored.watermark.get(), Some(ts(2)));

        assert!(store.advance_watermark(sub.id, ts(3)).unwrap());
        let stored = store.get_subscription(sub.id).unwrap().unwrap();
        assert_eq!(stored.watermark.get(), Some(ts(3)));
    }

    #[test]
    fn test_toggle_keeps_watermark() {
        let (store, source_id) = store_with_source();
        let sub = store.subscribe(1, source_id).unwrap();
        store.advance_watermark(sub.id, ts(5)).unwrap();

        store.set_active(1, source_id, false).unwrap();
        store.set_active(1, source_id, true).unwrap();

        let stored = store.get_subscription(sub.id).unwrap().unwrap();
        assert_eq!(stored.watermark.get(), Some(ts(5)));
    }

    #[test]
    fn test_delete_source_cascades() {
        let (store, source_id) = store_with_source();
        store.subscribe(1, source_id).unwrap();

        store.delete_source(source_id).unwrap();

        assert!(store.list_active_subscriptions().unwrap().is_empty());
        assert!(store.get_subscriber(1).unwrap().is_some());
    }

    #[test]
    fn test_unsubscribe() {
        let (store, source_id) = store_with_source();
        store.subscribe(1, source_id).unwrap();

        assert!(store.unsubscribe(1, source_id).unwrap());
        assert!(!store.unsubscribe(1, source_id).unwrap());
        assert!(store.list_subscriptions_for(1).unwrap().is_empty());
    }

    #[test]
    fn test_legacy_watermark_rows_are_read() {
        let (store, source_id) = store_with_source();
        let sub = store.subscribe(1, source_id).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE subscriptions SET watermark = '2024-01-03 00:00:00' WHERE id = ?1",
                params![sub.id],
            )
            .unwrap();

        let stored = store.get_subscription(sub.id).unwrap().unwrap();
        assert_eq!(stored.watermark.get(), Some(ts(3)));
    }

    #[test]
    fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidings.db");

        let sub_id = {
            let store = SqliteStore::new(&path).unwrap();
            let source_id = store
                .add_source(&Source::new("Example", "https://example.com/feed.xml"))
                .unwrap();
            let sub = store.subscribe(1, source_id).unwrap();
            store.advance_watermark(sub.id, ts(4)).unwrap();
            sub.id
        };

        let reopened = SqliteStore::new(&path).unwrap();
        let stored = reopened.get_subscription(sub_id).unwrap().unwrap();
        assert_eq!(stored.watermark.get(), Some(ts(4)));
    }

    #[test]
    fn test_offset_watermark_row_still_advances() {
        let (store, source_id) = store_with_source();
        let sub = store.subscribe(1, source_id).unwrap();
        // 2024-01-03T00:00:00Z written with a +05:00 offset.
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE subscriptions SET watermark = '2024-01-03T05:00:00+05:00' WHERE id = ?1",
                params![sub.id],
            )
            .unwrap();

        assert!(!store.advance_watermark(sub.id, ts(2)).unwrap());
        let later = Utc.with_ymd_and_hms(2024, 1, 3, 3, 0, 0).unwrap();
        assert!(store.advance_watermark(sub.id, later).unwrap());

        let stored = store.get_subscription(sub.id).unwrap().unwrap();
        assert_eq!(stored.watermark.get(), Some(later));
    }

    #[test]
    fn test_advance_unknown_subscription() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.advance_watermark(42, ts(1)).unwrap());
    }

    #[test]
    fn test_ensure_subscriber_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_subscriber(3).unwrap().is_none());

        let first = store.ensure_subscriber(3).unwrap();
        let again = store.ensure_subscriber(3).unwrap();

        assert_eq!(first.id, 3);
        assert_eq!(first.created_at, again.created_at);
        assert!(store.list_subscriptions_for(3).unwrap().is_empty());
    }
}
