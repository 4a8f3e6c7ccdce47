use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::app::Result;
use crate::fetcher::http_fetcher::USER_AGENT;
use crate::notifier::{DeliveryError, Notifier, OutgoingMessage};

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct Payload<'a> {
    subscriber_id: i64,
    title: &'a str,
    link: Option<&'a str>,
    text: &'a str,
}

/// Posts each notification as JSON to a relay endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Rejections of the payload itself are permanent; everything else is
    /// treated as the recipient being unreachable.
    pub fn classify(status: StatusCode) -> Option<DeliveryError> {
        if status.is_success() {
            return None;
        }
        let reason = format!("webhook answered {}", status);
        match status {
            StatusCode::BAD_REQUEST
            | StatusCode::PAYLOAD_TOO_LARGE
            | StatusCode::UNPROCESSABLE_ENTITY => Some(DeliveryError::Permanent(reason)),
            _ => Some(DeliveryError::Recoverable(reason)),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        subscriber_id: i64,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), DeliveryError> {
        let payload = Payload {
            subscriber_id,
            title: &message.title,
            link: message.link.as_deref(),
            text: &message.text,
        };
        let body =
            serde_json::to_vec(&payload).map_err(|e| DeliveryError::Permanent(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Recoverable(e.to_string()))?;

        match Self::classify(response.status()) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}
