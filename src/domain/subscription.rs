use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Publication time of the newest item already dispatched for a subscription.
///
/// An unset watermark means nothing has been sent yet. Watermarks only ever
/// move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark(Option<DateTime<Utc>>);

impl Watermark {
    pub fn unset() -> Self {
        Self(None)
    }

    pub fn at(ts: DateTime<Utc>) -> Self {
        Self(Some(ts))
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }

    /// Whether an item published at `ts` is newer than anything sent so far.
    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        match self.0 {
            None => true,
            Some(current) => ts > current,
        }
    }

    /// Storage form: RFC 3339, UTC, fixed nanosecond width, so that string
    /// order matches time order.
    pub fn encode(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    pub fn decode(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map(|naive| naive.and_utc())
                    .ok()
            })
    }
}

/// A subscriber's opt-in to one source, plus its dispatch watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub subscriber_id: i64,
    pub source_id: i64,
    pub watermark: Watermark,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
