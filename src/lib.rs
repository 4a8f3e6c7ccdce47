//! # tidings
//!
//! Polls RSS, Atom and JSON feeds and notifies each subscriber about every
//! new item exactly once.
//!
//! ## Architecture
//!
//! ```text
//! Registry → Fetcher → Normalizer → watermark check → Notifier → Registry
//! ```
//!
//! A background [`engine`] ticks on a fixed cadence. For every active
//! subscription it fetches the source's newest item, compares its
//! publication time with the subscription's watermark, sends it if newer,
//! and only then moves the watermark forward. Restarting resumes from the
//! stored watermarks.
//!
//! ## Quick Start
//!
//! ```bash
//! # Register a source
//! tidings source add https://blog.rust-lang.org/feed.xml --name "Rust Blog"
//!
//! # Subscribe subscriber 42 to source 1
//! tidings subscribe 42 1
//!
//! # Start dispatching
//! tidings run
//! ```

/// Application context and error types.
///
/// [`AppContext`](app::AppContext) wires the store, feed reader and notifier
/// together from a [`Config`](config::Config).
pub mod app;

/// Freshness cache for the headline feed.
pub mod cache;

/// Command-line interface using clap.
pub mod cli;

/// TOML configuration (`~/.config/tidings/config.toml`).
pub mod config;

/// Core domain models: [`Source`](domain::Source),
/// [`Subscription`](domain::Subscription) with its
/// [`Watermark`](domain::Watermark), and the transient
/// [`FeedItem`](domain::FeedItem).
pub mod domain;

/// Dispatch engine: tick loop, per-subscription decisions, backoff.
pub mod engine;

/// HTTP fetching and [`FeedReader`](fetcher::FeedReader).
pub mod fetcher;

/// Feed parsing and normalization.
///
/// Converts RSS 0.9x/1.0/2.0, Atom and JSON Feed into [`FeedItem`](domain::FeedItem)s.
pub mod normalizer;

/// Notification formatting and transports.
pub mod notifier;

/// SQLite persistence for sources, subscribers and watermarks.
pub mod store;
