pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tidings")]
#[command(about = "Polls feeds and notifies subscribers about new items", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/tidings/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Number of subscriptions processed concurrently per tick
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage feed sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Subscribe a subscriber to a source
    Subscribe {
        subscriber: i64,
        source: i64,
    },
    /// Remove a subscription
    Unsubscribe {
        subscriber: i64,
        source: i64,
    },
    /// Stop notifications for a subscription without forgetting its progress
    Pause {
        subscriber: i64,
        source: i64,
    },
    /// Resume a paused subscription
    Resume {
        subscriber: i64,
        source: i64,
    },
    /// List a subscriber's subscriptions
    Subscriptions {
        subscriber: i64,
    },
    /// Show the newest item of the headline feed, or of the given URL
    Latest {
        #[arg(long)]
        url: Option<String>,
    },
    /// Run the dispatch engine until interrupted
    Run {
        /// Tick interval (e.g., "5s", "1m"); overrides the config file
        #[arg(short, long)]
        interval: Option<String>,

        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
pub enum SourceAction {
    /// Add a new source
    Add {
        /// URL of the feed
        url: String,

        /// Display name (default: the URL's host)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove a source by id or URL, dropping its subscriptions
    Remove {
        source: String,
    },
    /// List sources
    List,
}
