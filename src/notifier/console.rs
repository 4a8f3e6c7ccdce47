use async_trait::async_trait;

use crate::notifier::{DeliveryError, Notifier, OutgoingMessage};

/// Writes each notification to stdout. Useful for dry runs.
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(
        &self,
        subscriber_id: i64,
        message: &OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        println!("--- to {} ---\n{}\n", subscriber_id, message.text);
        Ok(())
    }
}
