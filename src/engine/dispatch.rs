//! One pass over every active subscription.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::{Result, TidingsError};
use crate::domain::{Subscription, Watermark};
use crate::engine::EngineConfig;
use crate::fetcher::FeedReader;
use crate::notifier::{format_item, DeliveryError, Notifier};
use crate::store::{SourceRegistry, SubscriptionRegistry};

/// Collaborators a tick talks to.
pub struct DispatchContext {
    pub subscriptions: Arc<dyn SubscriptionRegistry + Send + Sync>,
    pub sources: Arc<dyn SourceRegistry + Send + Sync>,
    pub reader: FeedReader,
    pub notifier: Arc<dyn Notifier + Send + Sync>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing sent yet: send the current newest item only.
    FirstObservation,
    Newer,
    AlreadySeen,
}

/// Compare a fetched item's publication time against the stored watermark.
///
/// Items at or before the watermark are never dispatched, even when their
/// external id is new; they are treated as out-of-order noise.
pub fn decide(watermark: &Watermark, published_at: DateTime<Utc>) -> Decision {
    if watermark.is_unset() {
        Decision::FirstObservation
    } else if watermark.admits(published_at) {
        Decision::Newer
    } else {
        Decision::AlreadySeen
    }
}

/// What happened to one subscription during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Cancellation arrived before work started.
    Abandoned,
    SourceMissing,
    FetchFailed,
    EmptyFeed,
    UpToDate,
    Delivered,
    /// Delivery failed recoverably; the watermark moved anyway.
    Offered,
    /// Delivery was refused permanently; the watermark stayed put.
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub subscriptions: usize,
    pub delivered: usize,
    pub offered: usize,
    pub rejected: usize,
    pub up_to_date: usize,
    pub fetch_failed: usize,
    pub empty_feeds: usize,
    pub missing_sources: usize,
    pub abandoned: usize,
    pub errors: usize,
}

impl TickReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Abandoned => self.abandoned += 1,
            Outcome::SourceMissing => self.missing_sources += 1,
            Outcome::FetchFailed => self.fetch_failed += 1,
            Outcome::EmptyFeed => self.empty_feeds += 1,
            Outcome::UpToDate => self.up_to_date += 1,
            Outcome::Delivered => self.delivered += 1,
            Outcome::Offered => self.offered += 1,
            Outcome::Rejected => self.rejected += 1,
        }
    }

    /// Notifications handed to the notifier whose watermark advanced.
    pub fn dispatched(&self) -> usize {
        self.delivered + self.offered
    }
}

/// Run a single tick.
///
/// Per-subscription faults (fetch, empty feed, delivery) are absorbed into
/// the report. Store failures are systemic: the remaining subscriptions still
/// run, then the first such error is returned so the caller can back off.
pub async fn run_tick(
    ctx: &Arc<DispatchContext>,
    config: &EngineConfig,
    token: &CancellationToken,
) -> Result<TickReport> {
    let subscriptions = ctx.subscriptions.list_active_subscriptions()?;

    let mut report = TickReport {
        subscriptions: subscriptions.len(),
        ..TickReport::default()
    };
    if subscriptions.is_empty() {
        debug!("No active subscriptions");
        return Ok(report);
    }

    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut handles = Vec::with_capacity(subscriptions.len());

    for subscription in subscriptions {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        let token = token.clone();
        let config = *config;

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Ok(Outcome::Abandoned);
            };
            if token.is_cancelled() {
                return Ok(Outcome::Abandoned);
            }
            process_subscription(&ctx, &config, subscription).await
        }));
    }

    let mut first_error = None;
    for result in join_all(handles).await {
        match result {
            Ok(Ok(outcome)) => report.record(outcome),
            Ok(Err(e)) => {
                error!("Subscription processing failed: {}", e);
                report.errors += 1;
                first_error.get_or_insert(e);
            }
            Err(e) => {
                error!("Subscription task join error: {}", e);
                report.errors += 1;
                first_error.get_or_insert(TidingsError::Other(e.to_string()));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

async fn process_subscription(
    ctx: &DispatchContext,
    config: &EngineConfig,
    subscription: Subscription,
) -> Result<Outcome> {
    let Some(source) = ctx.sources.get_source(subscription.source_id)? else {
        debug!(
            "Subscription {} points at missing source {}",
            subscription.id, subscription.source_id
        );
        return Ok(Outcome::SourceMissing);
    };

    let fetched = timeout(config.fetch_timeout, ctx.reader.fetch_latest(&source.url))
        .await
        .unwrap_or(Err(TidingsError::Timeout(config.fetch_timeout)));
    let item = match fetched {
        Err(e) => {
            warn!("Failed to fetch {}: {}", source.url, e);
            return Ok(Outcome::FetchFailed);
        }
        Ok(None) => {
            debug!("{} has no entries", source.url);
            return Ok(Outcome::EmptyFeed);
        }
        Ok(Some(item)) => item,
    };

    let decision = decide(&subscription.watermark, item.published_at);
    if decision == Decision::AlreadySeen {
        return Ok(Outcome::UpToDate);
    }

    let message = format_item(&item);
    let delivery = timeout(
        config.delivery_timeout,
        ctx.notifier.send(subscription.subscriber_id, &message),
    )
    .await
    .unwrap_or_else(|_| {
        Err(DeliveryError::Recoverable(format!(
            "delivery timed out after {:?}",
            config.delivery_timeout
        )))
    });

    let outcome = match delivery {
        Ok(()) => Outcome::Delivered,
        Err(e) if e.is_permanent() => {
            warn!(
                "Delivery of {} to {} rejected, will retry next tick: {}",
                item.external_id, subscription.subscriber_id, e
            );
            return Ok(Outcome::Rejected);
        }
        Err(e) => {
            warn!(
                "Delivery of {} to {} failed: {}",
                item.external_id, subscription.subscriber_id, e
            );
            Outcome::Offered
        }
    };

    if !ctx
        .subscriptions
        .advance_watermark(subscription.id, item.published_at)?
    {
        warn!(
            "Watermark of subscription {} did not move past {}",
            subscription.id, item.published_at
        );
    }
    info!(
        "Sent \"{}\" from {} to {} ({:?})",
        item.display_title(),
        source.display_name(),
        subscription.subscriber_id,
        decision
    );

    Ok(outcome)
}
