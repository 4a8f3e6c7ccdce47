use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TidingsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported feed URL: {0}")]
    UnsupportedUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TidingsError>;
