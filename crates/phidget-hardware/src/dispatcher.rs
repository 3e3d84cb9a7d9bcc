//! Hardware event dispatch and webhook fan-out.
//!
//! [`EventDispatcher`] is the [`HardwareEventSink`] injected into every channel
//! the gateway opens. Callbacks may arrive on driver threads outside the async
//! runtime, so the dispatcher keeps a runtime [`Handle`] and spawns deliveries
//! onto it instead of relying on an ambient runtime.
//!
//! Each subscriber URL gets its own task with its own timeout. A slow or
//! failing endpoint never delays or cancels its siblings, and the callback
//! returns as soon as the tasks are spawned.

use crate::registry::ResourceRegistry;
use crate::transport::{StateChangeEvent, WebhookError, WebhookTransport};
use crate::webhooks::WebhookRegistry;
use phidget_core::{ChannelId, HardwareEventSink};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Webhook delivery counters.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeliverySnapshot {
    /// Deliveries started
    pub attempted: u64,
    /// Deliveries answered with 2xx
    pub delivered: u64,
    /// Deliveries that errored or timed out
    pub failed: u64,
}

impl DeliveryStats {
    /// Copy the current counters.
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Routes hardware callbacks to the registry and webhook subscribers.
pub struct EventDispatcher {
    resources: Arc<ResourceRegistry>,
    webhooks: Arc<WebhookRegistry>,
    transport: Arc<dyn WebhookTransport>,
    runtime: Handle,
    delivery_timeout: Duration,
    stats: Arc<DeliveryStats>,
}

impl EventDispatcher {
    /// Create a dispatcher that spawns deliveries on `runtime`.
    pub fn new(
        resources: Arc<ResourceRegistry>,
        webhooks: Arc<WebhookRegistry>,
        transport: Arc<dyn WebhookTransport>,
        runtime: Handle,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            resources,
            webhooks,
            transport,
            runtime,
            delivery_timeout,
            stats: Arc::new(DeliveryStats::default()),
        }
    }

    /// Delivery counters since creation.
    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }

    /// Schedule one delivery per subscriber of `name`.
    ///
    /// Returns immediately; the handles are only useful to callers that want
    /// to wait for delivery, such as tests.
    pub fn fan_out(&self, name: &str, state: bool) -> Vec<JoinHandle<()>> {
        let urls = self.webhooks.list_for(name);
        if urls.is_empty() {
            debug!(name = %name, state, "No webhooks subscribed");
            return Vec::new();
        }

        let event = Arc::new(StateChangeEvent {
            name: name.to_string(),
            state,
        });
        debug!(name = %name, state, subscribers = urls.len(), "Fanning out state change");

        urls.into_iter()
            .map(|url| {
                let transport = self.transport.clone();
                let stats = self.stats.clone();
                let event = event.clone();
                let timeout = self.delivery_timeout;
                self.runtime
                    .spawn(deliver(transport, stats, url, event, timeout))
            })
            .collect()
    }
}

async fn deliver(
    transport: Arc<dyn WebhookTransport>,
    stats: Arc<DeliveryStats>,
    url: String,
    event: Arc<StateChangeEvent>,
    timeout: Duration,
) {
    stats.attempted.fetch_add(1, Ordering::Relaxed);

    let result = match tokio::time::timeout(timeout, transport.deliver(&url, &event)).await {
        Ok(result) => result,
        Err(_) => Err(WebhookError::Timeout {
            url: url.clone(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    };

    match result {
        Ok(()) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(name = %event.name, url = %url, "Webhook delivered");
        }
        Err(err) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(name = %event.name, url = %url, error = %err, "Webhook delivery failed");
        }
    }
}

impl HardwareEventSink for EventDispatcher {
    fn on_attached(&self, channel: ChannelId) {
        let name = self.resources.name_for(channel);
        info!(channel = %channel, name = ?name, "Channel attached");
    }

    fn on_detached(&self, channel: ChannelId) {
        info!(channel = %channel, "Channel detached");
        self.resources.remove_by_channel(channel);
    }

    fn on_error(&self, channel: ChannelId, code: u32, description: &str) {
        let name = self.resources.name_for(channel);
        warn!(channel = %channel, name = ?name, code, description, "Channel error");
    }

    fn on_state_changed(&self, channel: ChannelId, state: bool) {
        match self.resources.name_for(channel) {
            Some(name) => {
                self.fan_out(&name, state);
            }
            None => debug!(channel = %channel, state, "State change from unregistered channel"),
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("delivery_timeout", &self.delivery_timeout)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OpenRequest;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use phidget_core::{ChannelAddress, ChannelKind};
    use phidget_driver_mock::MockHub;

    /// Records every attempt; URLs containing "fail" are rejected and URLs
    /// containing "slow" never answer.
    #[derive(Default)]
    struct RecordingTransport {
        attempts: Mutex<Vec<(String, StateChangeEvent)>>,
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn deliver(&self, url: &str, event: &StateChangeEvent) -> Result<(), WebhookError> {
            self.attempts.lock().push((url.to_string(), event.clone()));
            if url.contains("slow") {
                std::future::pending::<()>().await;
            }
            if url.contains("fail") {
                return Err(WebhookError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        hub: Arc<MockHub>,
        resources: Arc<ResourceRegistry>,
        webhooks: Arc<WebhookRegistry>,
        transport: Arc<RecordingTransport>,
        dispatcher: Arc<EventDispatcher>,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(MockHub::new());
        let resources = Arc::new(ResourceRegistry::new(hub.clone()));
        let webhooks = Arc::new(WebhookRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Arc::new(EventDispatcher::new(
            resources.clone(),
            webhooks.clone(),
            transport.clone(),
            Handle::current(),
            Duration::from_millis(500),
        ));
        Fixture {
            hub,
            resources,
            webhooks,
            transport,
            dispatcher,
        }
    }

    async fn open_door(fixture: &Fixture) -> ChannelId {
        fixture
            .resources
            .get_or_open(
                OpenRequest {
                    name: "door".to_string(),
                    kind: ChannelKind::DigitalInput,
                    address: ChannelAddress::new(0, 0),
                    timeout: Duration::from_millis(5000),
                },
                fixture.dispatcher.clone(),
            )
            .await
            .unwrap()
            .channel_id()
    }

    async fn wait_for_attempts(dispatcher: &EventDispatcher, count: u64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let stats = dispatcher.stats();
                if stats.delivered + stats.failed >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_suppress_sibling() {
        let fixture = fixture();
        fixture.webhooks.subscribe("door", "http://a/fail");
        fixture.webhooks.subscribe("door", "http://b/ok");

        for handle in fixture.dispatcher.fan_out("door", true) {
            handle.await.unwrap();
        }

        let mut urls: Vec<String> = fixture
            .transport
            .attempts
            .lock()
            .iter()
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        assert_eq!(urls, vec!["http://a/fail", "http://b/ok"]);
        assert_eq!(
            fixture.dispatcher.stats(),
            DeliverySnapshot {
                attempted: 2,
                delivered: 1,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_subscription_delivers_twice() {
        let fixture = fixture();
        fixture.webhooks.subscribe("door", "http://a/hook");
        fixture.webhooks.subscribe("door", "http://a/hook");

        for handle in fixture.dispatcher.fan_out("door", false) {
            handle.await.unwrap();
        }

        assert_eq!(fixture.transport.attempts.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_endpoint_times_out() {
        let fixture = fixture();
        fixture.webhooks.subscribe("door", "http://a/slow");
        fixture.webhooks.subscribe("door", "http://b/ok");

        for handle in fixture.dispatcher.fan_out("door", true) {
            handle.await.unwrap();
        }

        let stats = fixture.dispatcher.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_no_subscribers_spawns_nothing() {
        let fixture = fixture();
        assert!(fixture.dispatcher.fan_out("door", true).is_empty());
    }

    #[tokio::test]
    async fn test_state_change_resolves_name_and_delivers() {
        let fixture = fixture();
        fixture.webhooks.subscribe("door", "http://x/hook");
        open_door(&fixture).await;

        let mock = fixture.hub.channel_at(ChannelAddress::new(0, 0)).unwrap();
        assert!(mock.simulate_state_change(true).unwrap());
        wait_for_attempts(&fixture.dispatcher, 1).await;

        let attempts = fixture.transport.attempts.lock().clone();
        assert_eq!(
            attempts,
            vec![(
                "http://x/hook".to_string(),
                StateChangeEvent {
                    name: "door".to_string(),
                    state: true,
                }
            )]
        );
    }

    #[tokio::test]
    async fn test_state_change_from_unknown_channel_is_dropped() {
        let fixture = fixture();
        fixture.webhooks.subscribe("door", "http://x/hook");

        fixture
            .dispatcher
            .on_state_changed(ChannelId::new(999), true);
        tokio::task::yield_now().await;

        assert_eq!(fixture.dispatcher.stats(), DeliverySnapshot::default());
    }

    #[tokio::test]
    async fn test_detach_removes_resource() {
        let fixture = fixture();
        open_door(&fixture).await;

        fixture
            .hub
            .channel_at(ChannelAddress::new(0, 0))
            .unwrap()
            .simulate_detach();

        assert!(fixture.resources.resolve("door").is_none());
    }

    #[tokio::test]
    async fn test_error_keeps_resource() {
        let fixture = fixture();
        open_door(&fixture).await;

        fixture
            .hub
            .channel_at(ChannelAddress::new(0, 0))
            .unwrap()
            .simulate_error(0x1001, "Input overvoltage");

        assert!(fixture.resources.resolve("door").is_some());
    }

    #[tokio::test]
    async fn test_subscriptions_survive_close_and_reopen() {
        let fixture = fixture();
        fixture.webhooks.subscribe("door", "http://x/hook");
        open_door(&fixture).await;
        fixture.resources.remove("door").await.unwrap();
        open_door(&fixture).await;

        fixture
            .hub
            .channel_at(ChannelAddress::new(0, 0))
            .unwrap()
            .simulate_state_change(true)
            .unwrap();
        wait_for_attempts(&fixture.dispatcher, 1).await;

        assert_eq!(fixture.dispatcher.stats().delivered, 1);
    }
}
