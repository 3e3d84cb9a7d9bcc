//! Webhook delivery transport.
//!
//! [`WebhookTransport`] performs a single delivery attempt. The dispatcher
//! owns scheduling, per-delivery timeouts and failure isolation; transports
//! only report whether one POST succeeded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Webhook payload sent when a digital input changes state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    /// Resource name the input is registered under
    pub name: String,
    /// New input state
    pub state: bool,
}

/// Failure of a single webhook delivery.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Network or client failure
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("webhook {url} answered {status}")]
    Status {
        /// Subscriber URL
        url: String,
        /// HTTP status returned
        status: u16,
    },

    /// No answer within the delivery timeout
    #[error("webhook {url} timed out after {after_ms} ms")]
    Timeout {
        /// Subscriber URL
        url: String,
        /// Timeout that elapsed
        after_ms: u64,
    },
}

/// Delivers one event to one subscriber URL.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `event` to `url` once.
    async fn deliver(&self, url: &str, event: &StateChangeEvent) -> Result<(), WebhookError>;
}

/// HTTP transport that POSTs the event as JSON.
///
/// Any non-2xx answer counts as a failed delivery.
#[derive(Debug, Clone)]
pub struct HttpWebhookTransport {
    client: reqwest::Client,
}

impl HttpWebhookTransport {
    /// Build a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(&self, url: &str, event: &StateChangeEvent) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
