//! Webhook subscriptions.
//!
//! Subscriptions are keyed by resource name, not by channel, so they survive
//! the resource being closed or detached and apply again when the name is
//! reopened. Lists are append-only and keep duplicates.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Map from resource name to subscriber URLs in registration order.
#[derive(Debug, Default)]
pub struct WebhookRegistry {
    subscribers: RwLock<HashMap<String, Vec<String>>>,
}

impl WebhookRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `url` to the subscribers of `name`.
    pub fn subscribe(&self, name: &str, url: impl Into<String>) {
        let url = url.into();
        debug!(name = %name, url = %url, "Webhook subscribed");
        self.subscribers
            .write()
            .entry(name.to_string())
            .or_default()
            .push(url);
    }

    /// Subscriber URLs for `name`, possibly empty.
    pub fn list_for(&self, name: &str) -> Vec<String> {
        self.subscribers
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of subscriptions across all names.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }
}
