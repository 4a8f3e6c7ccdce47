use std::time::Duration;

use tracing::info;
use url::Url;

use crate::app::{AppContext, Result, TidingsError};
use crate::domain::{FeedItem, Source};
use crate::engine::{Engine, EngineConfig};
use crate::notifier::format_item;
use crate::store::{SourceRegistry, SubscriptionRegistry};

/// Check that a source URL is an absolute http(s) URL with a host.
pub fn validate_source_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(TidingsError::UnsupportedUrl(format!(
                "unsupported scheme {}",
                scheme
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(TidingsError::UnsupportedUrl(format!("{} has no host", raw)));
    }

    Ok(url)
}

pub async fn add_source(ctx: &AppContext, url: &str, name: Option<&str>) -> Result<i64> {
    let url = validate_source_url(url)?;

    if let Some(existing) = ctx.store.get_source_by_url(url.as_str())? {
        println!("Source already exists: {} (id {})", existing.url, existing.id);
        return Ok(existing.id);
    }

    let name = name
        .map(String::from)
        .or_else(|| url.host_str().map(String::from))
        .unwrap_or_else(|| url.to_string());
    let id = ctx.store.add_source(&Source::new(name, url.as_str()))?;
    println!("Added source {}: {}", id, url);

    match ctx.reader.fetch_all(url.as_str()).await {
        Ok(items) => println!("Feed currently has {} items", items.len()),
        Err(e) => eprintln!("Warning: could not fetch the feed yet: {}", e),
    }

    Ok(id)
}

pub fn remove_source(ctx: &AppContext, source: &str) -> Result<()> {
    let found = match source.parse::<i64>() {
        Ok(id) => ctx.store.get_source(id)?,
        Err(_) => ctx.store.get_source_by_url(source)?,
    };
    let found = found.ok_or_else(|| TidingsError::SourceNotFound(source.to_string()))?;

    ctx.store.delete_source(found.id)?;
    println!("Removed source {}: {}", found.id, found.url);
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let sources = ctx.store.list_sources()?;

    if sources.is_empty() {
        println!("No sources");
        return Ok(());
    }

    for source in sources {
        println!("{:>4}  {}  ({})", source.id, source.display_name(), source.url);
    }
    Ok(())
}

pub fn subscribe(ctx: &AppContext, subscriber: i64, source: i64) -> Result<()> {
    let known = ctx.store.ensure_subscriber(subscriber)?;
    info!("Subscriber {} registered since {}", known.id, known.created_at);
    let subscription = ctx.store.subscribe(subscriber, source)?;
    println!(
        "Subscriber {} follows source {} (subscription {})",
        subscriber, source, subscription.id
    );
    Ok(())
}

pub fn unsubscribe(ctx: &AppContext, subscriber: i64, source: i64) -> Result<()> {
    if ctx.store.unsubscribe(subscriber, source)? {
        println!("Subscriber {} no longer follows source {}", subscriber, source);
        Ok(())
    } else {
        Err(TidingsError::SubscriptionNotFound(format!(
            "{}/{}",
            subscriber, source
        )))
    }
}

pub fn set_active(ctx: &AppContext, subscriber: i64, source: i64, active: bool) -> Result<()> {
    if !ctx.store.set_active(subscriber, source, active)? {
        return Err(TidingsError::SubscriptionNotFound(format!(
            "{}/{}",
            subscriber, source
        )));
    }

    let status = if active { "resumed" } else { "paused" };
    println!("Subscription {}/{} {}", subscriber, source, status);
    Ok(())
}

pub fn list_subscriptions(ctx: &AppContext, subscriber: i64) -> Result<()> {
    let subscriptions = ctx.store.list_subscriptions_for(subscriber)?;

    if subscriptions.is_empty() {
        println!("No subscriptions for {}", subscriber);
        return Ok(());
    }

    for sub in subscriptions {
        let source = ctx
            .store
            .get_source(sub.source_id)?
            .map(|s| s.display_name().to_string())
            .unwrap_or_else(|| format!("source {}", sub.source_id));
        let watermark = sub
            .watermark
            .get()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "nothing sent yet".into());
        let status = if sub.active { "" } else { " [paused]" };
        println!("{:>4}  {}  last: {}{}", sub.id, source, watermark, status);
    }
    Ok(())
}

pub async fn show_latest(ctx: &AppContext, url: Option<&str>) -> Result<()> {
    let item: Option<FeedItem> = match url {
        Some(url) => {
            let url = validate_source_url(url)?;
            ctx.reader.fetch_latest(url.as_str()).await?
        }
        None => {
            let cache = ctx.headline_cache().ok_or_else(|| {
                TidingsError::Config("no [headline] url configured; pass --url".into())
            })?;
            cache.get().await
        }
    };

    match item {
        Some(item) => println!("{}", format_item(&item).text),
        None => println!("No available articles."),
    }
    Ok(())
}

pub async fn run_engine(ctx: &AppContext, interval: Option<&str>, once: bool) -> Result<()> {
    let mut config: EngineConfig = ctx.engine_config();
    if let Some(interval) = interval {
        let secs = crate::config::interval::parse_interval(interval).map_err(TidingsError::Config)?;
        config.tick_interval = Duration::from_secs(secs.max(1));
    }

    let engine = Engine::new(config);
    let dispatch = ctx.dispatch_context();

    if once {
        let report = engine.run_once(&dispatch).await?;
        println!(
            "Tick complete: {} subscriptions, {} sent, {} rejected, {} failed fetches",
            report.subscriptions,
            report.dispatched(),
            report.rejected,
            report.fetch_failed
        );
        return Ok(());
    }

    engine.start(dispatch);
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, finishing current tick");
    engine.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_validate_source_url() {
        assert!(validate_source_url("https://example.com/feed.xml").is_ok());
        assert!(validate_source_url(" http://example.com/rss ").is_ok());
        assert!(matches!(
            validate_source_url("ftp://example.com/feed"),
            Err(TidingsError::UnsupportedUrl(_))
        ));
        assert!(matches!(
            validate_source_url("not a url"),
            Err(TidingsError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_subscription_commands() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        let source = ctx
            .store
            .add_source(&Source::new("Example", "https://example.com/feed.xml"))
            .unwrap();

        subscribe(&ctx, 3, source).unwrap();
        set_active(&ctx, 3, source, false).unwrap();
        assert!(ctx.store.list_active_subscriptions().unwrap().is_empty());
        set_active(&ctx, 3, source, true).unwrap();
        list_subscriptions(&ctx, 3).unwrap();

        unsubscribe(&ctx, 3, source).unwrap();
        assert!(matches!(
            unsubscribe(&ctx, 3, source),
            Err(TidingsError::SubscriptionNotFound(_))
        ));
    }

    #[test]
    fn test_remove_source_by_id_or_url() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        let a = ctx
            .store
            .add_source(&Source::new("A", "https://a.example.com/feed"))
            .unwrap();
        ctx.store
            .add_source(&Source::new("B", "https://b.example.com/feed"))
            .unwrap();

        remove_source(&ctx, &a.to_string()).unwrap();
        remove_source(&ctx, "https://b.example.com/feed").unwrap();
        assert!(ctx.store.list_sources().unwrap().is_empty());
        assert!(matches!(
            remove_source(&ctx, "42"),
            Err(TidingsError::SourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_latest_without_headline_is_config_error() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        let result = show_latest(&ctx, None).await;
        assert!(matches!(result, Err(TidingsError::Config(_))));
    }
}
