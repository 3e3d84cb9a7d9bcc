//! Resource registry.
//!
//! The [`ResourceRegistry`] is the single source of truth for which names are
//! open and as what. It maps names to [`NamedResource`]s and keeps a reverse
//! index from [`ChannelId`] to name so hardware callbacks can be resolved
//! without scanning.
//!
//! # Concurrency
//!
//! - Both indexes live under one `parking_lot::RwLock` and are updated in
//!   lockstep. The lock is never held across an `.await`.
//! - Opening and closing a name goes through a per-name async gate. Two
//!   requests racing to open the same new name are serialized: the second one
//!   observes the first one's resource, or retries the open if it failed.
//!   Different names never wait on each other, so a slow attach only blocks
//!   requests for that name.
//! - Detach handling ([`ResourceRegistry::remove_by_channel`]) is synchronous
//!   and bypasses the gate; it only removes the entry if it still belongs to
//!   the detached channel.

use crate::resource::{NamedResource, ResourceStatus};
use parking_lot::{Mutex, RwLock};
use phidget_core::{
    ChannelAddress, ChannelFactory, ChannelId, ChannelKind, ChannelSpec, GatewayError,
    GatewayResult, HardwareEventSink,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parameters for [`ResourceRegistry::get_or_open`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    /// Logical resource name
    pub name: String,
    /// Channel type to create if the name is unknown
    pub kind: ChannelKind,
    /// Hub location; ignored when the name is already registered
    pub address: ChannelAddress,
    /// How long to wait for the channel to attach
    pub timeout: Duration,
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, Arc<NamedResource>>,
    by_channel: HashMap<ChannelId, String>,
}

impl Entries {
    fn insert(&mut self, resource: Arc<NamedResource>) {
        self.by_channel
            .insert(resource.channel_id(), resource.name().to_string());
        self.by_name.insert(resource.name().to_string(), resource);
    }

    /// Remove `name` only while it is still bound to `channel`.
    fn remove_if_bound(&mut self, name: &str, channel: ChannelId) -> Option<Arc<NamedResource>> {
        if self.by_name.get(name)?.channel_id() != channel {
            return None;
        }
        self.by_channel.remove(&channel);
        self.by_name.remove(name)
    }
}

/// Per-name async locks serializing open and close of the same name.
#[derive(Default)]
struct OpenGates {
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OpenGates {
    fn ticket(&self, name: &str) -> GateTicket<'_> {
        let gate = self
            .gates
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();
        GateTicket {
            gates: self,
            name: name.to_string(),
            gate,
        }
    }
}

/// Holds a reference to one name's gate; drops the map entry when it is the
/// last user.
struct GateTicket<'a> {
    gates: &'a OpenGates,
    name: String,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl GateTicket<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.gates.lock();
        // Tickets are only issued under this lock, so a count of two
        // (map + this ticket) means nobody else is waiting.
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(&self.name);
        }
    }
}

/// Central map from name to open hardware channel.
pub struct ResourceRegistry {
    factory: Arc<dyn ChannelFactory>,
    entries: RwLock<Entries>,
    gates: OpenGates,
    next_channel_id: AtomicU64,
}

impl ResourceRegistry {
    /// Create an empty registry that builds channels with `factory`.
    pub fn new(factory: Arc<dyn ChannelFactory>) -> Self {
        Self {
            factory,
            entries: RwLock::new(Entries::default()),
            gates: OpenGates::default(),
            next_channel_id: AtomicU64::new(1),
        }
    }

    /// Driver type of the channel factory.
    pub fn driver_type(&self) -> &'static str {
        self.factory.driver_type()
    }

    /// Look up a resource by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<NamedResource>> {
        self.entries.read().by_name.get(name).cloned()
    }

    /// Reverse lookup from channel identity to resource name.
    pub fn name_for(&self, channel: ChannelId) -> Option<String> {
        self.entries.read().by_channel.get(&channel).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().by_name.contains_key(name)
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.read().by_name.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().by_name.is_empty()
    }

    /// Return the resource registered under `request.name`, opening a new
    /// channel if the name is unknown.
    ///
    /// An existing resource is returned as-is, even when `request.kind`
    /// differs from the kind it was created with.
    ///
    /// # Errors
    /// - `MissingHardwareAddress` if the name is unknown and the address
    ///   carries the `-1` sentinel
    /// - `HardwareOpen` if the channel fails to attach; nothing is registered
    pub async fn get_or_open(
        &self,
        request: OpenRequest,
        sink: Arc<dyn HardwareEventSink>,
    ) -> GatewayResult<Arc<NamedResource>> {
        if let Some(existing) = self.reuse(&request) {
            return Ok(existing);
        }

        let ticket = self.gates.ticket(&request.name);
        let _guard = ticket.lock().await;

        // Another request may have opened the name while we waited.
        if let Some(existing) = self.reuse(&request) {
            return Ok(existing);
        }
        if request.address.is_missing() {
            return Err(GatewayError::MissingHardwareAddress { name: request.name });
        }

        let spec = ChannelSpec {
            id: ChannelId::new(self.next_channel_id.fetch_add(1, Ordering::Relaxed)),
            kind: request.kind,
            address: request.address,
        };
        let channel = self.factory.create(spec, sink);

        if let Err(source) = channel.open(request.timeout).await {
            warn!(
                name = %request.name,
                kind = %request.kind,
                address = %request.address,
                error = %source,
                "Failed to open channel"
            );
            if let Err(close_err) = channel.close().await {
                debug!(channel = %spec.id, error = %close_err, "Close after failed open");
            }
            return Err(GatewayError::HardwareOpen {
                name: request.name,
                source,
            });
        }

        let resource = Arc::new(NamedResource::new(request.name, request.kind, channel));
        self.entries.write().insert(resource.clone());
        info!(
            name = %resource.name(),
            kind = %resource.kind(),
            address = %request.address,
            channel = %spec.id,
            "Opened channel"
        );
        Ok(resource)
    }

    fn reuse(&self, request: &OpenRequest) -> Option<Arc<NamedResource>> {
        let existing = self.resolve(&request.name)?;
        if existing.kind() != request.kind {
            warn!(
                name = %request.name,
                registered = %existing.kind(),
                requested = %request.kind,
                "Reusing resource registered with a different channel type"
            );
        }
        Some(existing)
    }

    /// Close the channel registered under `name` and drop the entry.
    ///
    /// # Errors
    /// - `NotFound` if the name is not registered
    /// - `Close` if the device fails to close; the entry stays registered
    pub async fn remove(&self, name: &str) -> GatewayResult<()> {
        let ticket = self.gates.ticket(name);
        let _guard = ticket.lock().await;

        let resource = self.resolve(name).ok_or_else(|| GatewayError::NotFound {
            name: name.to_string(),
        })?;

        resource
            .channel()
            .close()
            .await
            .map_err(|source| GatewayError::Close {
                name: name.to_string(),
                source,
            })?;

        self.entries
            .write()
            .remove_if_bound(name, resource.channel_id());
        info!(name = %name, channel = %resource.channel_id(), "Closed channel");
        Ok(())
    }

    /// Drop the entry bound to `channel` without closing it.
    ///
    /// Used when the hardware detached on its own.
    pub fn remove_by_channel(&self, channel: ChannelId) -> Option<Arc<NamedResource>> {
        let mut entries = self.entries.write();
        let name = entries.by_channel.get(&channel)?.clone();
        let removed = entries.remove_if_bound(&name, channel);
        drop(entries);

        if removed.is_some() {
            info!(name = %name, channel = %channel, "Removed detached channel");
        }
        removed
    }

    /// Status record for every registered resource, in no particular order.
    pub async fn snapshot(&self) -> Vec<ResourceStatus> {
        let resources: Vec<Arc<NamedResource>> =
            self.entries.read().by_name.values().cloned().collect();
        let statuses = resources.iter().map(|resource| resource.status());
        futures::future::join_all(statuses).await
    }

    /// Remove and return every resource without closing it.
    pub fn drain(&self) -> Vec<Arc<NamedResource>> {
        let mut entries = self.entries.write();
        entries.by_channel.clear();
        entries.by_name.drain().map(|(_, resource)| resource).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phidget_core::DriverErrorKind;
    use phidget_driver_mock::{
        ChannelOp, ErrorConfig, ErrorScenario, MockHub, MockHubConfig, MockMode,
    };

    const TIMEOUT: Duration = Duration::from_millis(5000);

    struct NullSink;

    impl HardwareEventSink for NullSink {
        fn on_attached(&self, _channel: ChannelId) {}
        fn on_detached(&self, _channel: ChannelId) {}
        fn on_error(&self, _channel: ChannelId, _code: u32, _description: &str) {}
        fn on_state_changed(&self, _channel: ChannelId, _state: bool) {}
    }

    fn sink() -> Arc<dyn HardwareEventSink> {
        Arc::new(NullSink)
    }

    fn request(name: &str, kind: ChannelKind, channel: i32, hub_port: i32) -> OpenRequest {
        OpenRequest {
            name: name.to_string(),
            kind,
            address: ChannelAddress::new(channel, hub_port),
            timeout: TIMEOUT,
        }
    }

    fn registry() -> (Arc<MockHub>, ResourceRegistry) {
        let hub = Arc::new(MockHub::new());
        let registry = ResourceRegistry::new(hub.clone());
        (hub, registry)
    }

    #[tokio::test]
    async fn test_open_then_resolve() {
        let (_hub, registry) = registry();

        let resource = registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();

        assert_eq!(resource.name(), "pump");
        assert_eq!(resource.kind(), ChannelKind::DigitalOutput);
        assert!(registry.resolve("pump").is_some());
        assert_eq!(
            registry.name_for(resource.channel_id()).as_deref(),
            Some("pump")
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_reuses_existing_channel() {
        let (hub, registry) = registry();

        let first = registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();
        let second = registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hub.created_count(), 1);
    }

    #[tokio::test]
    async fn test_reopen_with_other_kind_keeps_original() {
        let (hub, registry) = registry();

        registry
            .get_or_open(request("valve", ChannelKind::DigitalOutput, 1, 0), sink())
            .await
            .unwrap();
        let reused = registry
            .get_or_open(request("valve", ChannelKind::VoltageOutput, 5, 5), sink())
            .await
            .unwrap();

        assert_eq!(reused.kind(), ChannelKind::DigitalOutput);
        assert_eq!(reused.channel().address(), ChannelAddress::new(1, 0));
        assert_eq!(hub.created_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_name_ignores_sentinel_address() {
        let (_hub, registry) = registry();
        registry
            .get_or_open(request("fan", ChannelKind::DigitalOutput, 2, 0), sink())
            .await
            .unwrap();

        let reused = registry
            .get_or_open(request("fan", ChannelKind::DigitalOutput, -1, -1), sink())
            .await;
        assert!(reused.is_ok());
    }

    #[tokio::test]
    async fn test_missing_address_for_unknown_name() {
        let (hub, registry) = registry();

        for (channel, hub_port) in [(-1, 0), (0, -1), (-1, -1)] {
            let err = registry
                .get_or_open(
                    request("ghost", ChannelKind::DigitalOutput, channel, hub_port),
                    sink(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::MissingHardwareAddress { .. }));
        }
        assert_eq!(hub.created_count(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_registers_nothing() {
        let (_hub, registry) = registry();

        let err = registry
            .get_or_open(request("far", ChannelKind::DigitalOutput, 0, 42), sink())
            .await
            .unwrap_err();

        match err {
            GatewayError::HardwareOpen { name, source } => {
                assert_eq!(name, "far");
                assert_eq!(source.kind, DriverErrorKind::Timeout);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(registry.resolve("far").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_injected_open_failure_registers_nothing() {
        let hub = Arc::new(MockHub::new().with_errors(ErrorConfig::scenario(
            ErrorScenario::FailAfterN {
                operation: ChannelOp::Open,
                count: 0,
            },
        )));
        let registry = ResourceRegistry::new(hub.clone());

        assert!(registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_same_name_creates_one_channel() {
        let hub = Arc::new(MockHub::with_config(MockHubConfig {
            mode: MockMode::Realistic,
            ..Default::default()
        }));
        let registry = Arc::new(ResourceRegistry::new(hub.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .get_or_open(request("door", ChannelKind::DigitalInput, 0, 0), sink())
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().channel_id());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(hub.created_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_open_does_not_block_other_names() {
        let hub = Arc::new(MockHub::with_config(MockHubConfig {
            mode: MockMode::Realistic,
            ..Default::default()
        }));
        let registry = Arc::new(ResourceRegistry::new(hub));

        // Port 9 does not exist, so this open waits for the full timeout.
        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_open(request("missing", ChannelKind::DigitalOutput, 0, 9), sink())
                    .await
            })
        };
        tokio::task::yield_now().await;

        let started = tokio::time::Instant::now();
        registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();
        assert!(started.elapsed() < TIMEOUT);

        assert!(slow.await.unwrap().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unspecified_address_waits_for_inflight_open() {
        let hub = Arc::new(MockHub::with_config(MockHubConfig {
            mode: MockMode::Realistic,
            ..Default::default()
        }));
        let registry = Arc::new(ResourceRegistry::new(hub.clone()));

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(!registry.contains("pump"));

        let second = registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, -1, -1), sink())
            .await
            .unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(second.channel_id(), first.channel_id());
        assert_eq!(hub.created_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_closes_and_forgets() {
        let (hub, registry) = registry();
        let resource = registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();

        registry.remove("pump").await.unwrap();

        assert!(registry.resolve("pump").is_none());
        assert!(registry.name_for(resource.channel_id()).is_none());
        assert!(registry.snapshot().await.is_empty());
        assert!(!hub.channel(resource.channel_id()).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_remove_unknown_name() {
        let (_hub, registry) = registry();
        registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();
        let before = registry.snapshot().await;

        let err = registry.remove("nope").await.unwrap_err();

        assert!(matches!(err, GatewayError::NotFound { .. }));
        assert_eq!(registry.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_failed_close_keeps_entry() {
        let hub = Arc::new(MockHub::new().with_errors(ErrorConfig::scenario(
            ErrorScenario::Timeout { operation: ChannelOp::Close },
        )));
        let registry = ResourceRegistry::new(hub);
        registry
            .get_or_open(request("pump", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();

        let err = registry.remove("pump").await.unwrap_err();

        assert!(matches!(err, GatewayError::Close { .. }));
        assert!(registry.contains("pump"));
    }

    #[tokio::test]
    async fn test_remove_by_channel_skips_close() {
        let (hub, registry) = registry();
        let resource = registry
            .get_or_open(request("door", ChannelKind::DigitalInput, 3, 1), sink())
            .await
            .unwrap();

        let removed = registry.remove_by_channel(resource.channel_id()).unwrap();

        assert_eq!(removed.name(), "door");
        assert!(registry.is_empty());
        assert!(hub.channel(resource.channel_id()).unwrap().is_open());
        assert!(registry.remove_by_channel(resource.channel_id()).is_none());
    }

    #[tokio::test]
    async fn test_stale_detach_does_not_remove_reopened_name() {
        let (_hub, registry) = registry();
        let old = registry
            .get_or_open(request("door", ChannelKind::DigitalInput, 0, 0), sink())
            .await
            .unwrap();
        registry.remove("door").await.unwrap();
        let new = registry
            .get_or_open(request("door", ChannelKind::DigitalInput, 0, 0), sink())
            .await
            .unwrap();

        assert!(registry.remove_by_channel(old.channel_id()).is_none());
        assert_eq!(
            registry.resolve("door").unwrap().channel_id(),
            new.channel_id()
        );
    }

    #[tokio::test]
    async fn test_snapshot_reflects_latest_values() {
        let (_hub, registry) = registry();
        let relay = registry
            .get_or_open(request("relay", ChannelKind::DigitalOutput, 0, 0), sink())
            .await
            .unwrap();
        let dac = registry
            .get_or_open(request("dac", ChannelKind::VoltageOutput, 0, 1), sink())
            .await
            .unwrap();

        relay.set_state(true).await.unwrap();
        dac.set_voltage(3.3).await.unwrap();
        dac.set_voltage(-4.5).await.unwrap();

        let mut snapshot = registry.snapshot().await;
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "dac", "type": "VoltageOutput", "voltage": -4.5},
                {"name": "relay", "type": "DigitalOutput", "state": true},
            ])
        );
    }

    #[tokio::test]
    async fn test_drain_empties_registry() {
        let (_hub, registry) = registry();
        for (index, name) in ["a", "b", "c"].iter().enumerate() {
            registry
                .get_or_open(
                    request(name, ChannelKind::DigitalOutput, index as i32, 0),
                    sink(),
                )
                .await
                .unwrap();
        }

        let drained = registry.drain();

        assert_eq!(drained.len(), 3);
        assert!(registry.is_empty());
        assert!(registry.resolve("a").is_none());
    }
}
