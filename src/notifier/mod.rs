//! Delivery of formatted items to subscribers.
//!
//! The engine only sees the [`Notifier`] trait. Concrete transports live in
//! submodules.

pub mod console;
pub mod format;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use console::ConsoleNotifier;
pub use format::format_item;
pub use webhook::WebhookNotifier;

/// A rendered notification ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub title: String,
    pub link: Option<String>,
    /// HTML-formatted body.
    pub text: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient could not be reached right now. The item counts as offered.
    #[error("recipient unreachable: {0}")]
    Recoverable(String),

    /// The message itself was rejected; it should be retried once fixed.
    #[error("message rejected: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Permanent(_))
    }
}

#[async_trait]
pub trait Notifier {
    async fn send(
        &self,
        subscriber_id: i64,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), DeliveryError>;
}
