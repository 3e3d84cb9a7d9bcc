//! Gateway service.
//!
//! [`GatewayService`] owns the resource registry, the webhook registry and the
//! event dispatcher for the lifetime of the process. HTTP handlers and the
//! binary go through it instead of touching the registries directly.
//!
//! Channels hold the dispatcher as their event sink and the dispatcher holds
//! the registry, so open channels keep the whole graph alive. Call
//! [`GatewayService::shutdown`] to close them and release it.

use crate::config::{GatewayConfig, StartupChannel};
use phidget_core::{
    ChannelAddress, ChannelFactory, ChannelKind, GatewayError, GatewayResult, HardwareEventSink,
    OUTPUT_VOLTAGE_RANGE,
};
use phidget_hardware::{
    DeliverySnapshot, EventDispatcher, HttpWebhookTransport, NamedResource, OpenRequest,
    ResourceRegistry, ResourceStatus, WebhookRegistry, WebhookTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

/// Process-wide owner of registries and dispatch.
pub struct GatewayService {
    resources: Arc<ResourceRegistry>,
    webhooks: Arc<WebhookRegistry>,
    dispatcher: Arc<EventDispatcher>,
    open_timeout: Duration,
    startup_channels: Vec<StartupChannel>,
}

impl GatewayService {
    /// Build the service with an HTTP webhook transport.
    ///
    /// Must be called from within a tokio runtime; webhook deliveries are
    /// spawned onto it.
    pub fn new(config: &GatewayConfig, factory: Arc<dyn ChannelFactory>) -> GatewayResult<Self> {
        let transport = HttpWebhookTransport::new(
            config.webhooks.delivery_timeout(),
            &config.webhooks.user_agent,
        )
        .map_err(|e| GatewayError::Config(format!("failed to build webhook client: {}", e)))?;
        Self::with_transport(config, factory, Arc::new(transport))
    }

    /// Build the service with a custom webhook transport.
    pub fn with_transport(
        config: &GatewayConfig,
        factory: Arc<dyn ChannelFactory>,
        transport: Arc<dyn WebhookTransport>,
    ) -> GatewayResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| GatewayError::Config(format!("no tokio runtime available: {}", e)))?;

        let resources = Arc::new(ResourceRegistry::new(factory));
        let webhooks = Arc::new(WebhookRegistry::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            resources.clone(),
            webhooks.clone(),
            transport,
            runtime,
            config.webhooks.delivery_timeout(),
        ));

        info!(
            driver = resources.driver_type(),
            open_timeout_ms = config.hardware.open_timeout_ms,
            "Gateway service created"
        );

        Ok(Self {
            resources,
            webhooks,
            dispatcher,
            open_timeout: config.hardware.open_timeout(),
            startup_channels: config.channels.clone(),
        })
    }

    /// Named resource registry.
    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// Webhook subscriptions.
    pub fn webhooks(&self) -> &Arc<WebhookRegistry> {
        &self.webhooks
    }

    /// Webhook delivery counters.
    pub fn delivery_stats(&self) -> DeliverySnapshot {
        self.dispatcher.stats()
    }

    async fn get_or_open(
        &self,
        name: &str,
        kind: ChannelKind,
        address: ChannelAddress,
    ) -> GatewayResult<Arc<NamedResource>> {
        let sink: Arc<dyn HardwareEventSink> = self.dispatcher.clone();
        self.resources
            .get_or_open(
                OpenRequest {
                    name: name.to_string(),
                    kind,
                    address,
                    timeout: self.open_timeout,
                },
                sink,
            )
            .await
    }

    /// Drive a digital output, opening it first if the name is unknown.
    pub async fn set_digital_output(
        &self,
        name: &str,
        state: bool,
        address: ChannelAddress,
    ) -> GatewayResult<()> {
        let resource = self
            .get_or_open(name, ChannelKind::DigitalOutput, address)
            .await?;
        resource
            .set_state(state)
            .await
            .map_err(|source| GatewayError::Hardware {
                name: name.to_string(),
                source,
            })
    }

    /// Drive a voltage output, opening it first if the name is unknown.
    ///
    /// Voltages outside ±10 V are rejected before any hardware is touched.
    pub async fn set_voltage_output(
        &self,
        name: &str,
        volts: f64,
        address: ChannelAddress,
    ) -> GatewayResult<()> {
        if !OUTPUT_VOLTAGE_RANGE.contains(&volts) {
            return Err(GatewayError::validation("target_state must be +/- 10V"));
        }
        let resource = self
            .get_or_open(name, ChannelKind::VoltageOutput, address)
            .await?;
        resource
            .set_voltage(volts)
            .await
            .map_err(|source| GatewayError::Hardware {
                name: name.to_string(),
                source,
            })
    }

    /// Open a digital input and optionally subscribe a webhook to it.
    ///
    /// The webhook is only registered once the input is open.
    pub async fn open_digital_input(
        &self,
        name: &str,
        address: ChannelAddress,
        webhook: Option<&str>,
    ) -> GatewayResult<()> {
        self.get_or_open(name, ChannelKind::DigitalInput, address)
            .await?;
        if let Some(url) = webhook.filter(|url| !url.is_empty()) {
            self.webhooks.subscribe(name, url);
        }
        Ok(())
    }

    /// Close and forget a named channel.
    pub async fn close(&self, name: &str) -> GatewayResult<()> {
        self.resources.remove(name).await
    }

    /// Status records sorted by name.
    pub async fn snapshot(&self) -> Vec<ResourceStatus> {
        let mut statuses = self.resources.snapshot().await;
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Open the channels listed in the configuration.
    ///
    /// Failures are logged and skipped. Returns the number of channels opened.
    pub async fn open_startup_channels(&self) -> usize {
        let mut opened = 0;
        for channel in &self.startup_channels {
            match self
                .get_or_open(&channel.name, channel.kind, channel.address())
                .await
            {
                Ok(_) => {
                    for url in &channel.webhooks {
                        self.webhooks.subscribe(&channel.name, url.as_str());
                    }
                    opened += 1;
                }
                Err(err) => {
                    warn!(name = %channel.name, error = %err, "Skipping startup channel");
                }
            }
        }
        info!(
            opened,
            configured = self.startup_channels.len(),
            "Startup channels opened"
        );
        opened
    }

    /// Close every open channel and empty the registry.
    pub async fn shutdown(&self) {
        let resources = self.resources.drain();
        info!(count = resources.len(), "Closing channels");
        for resource in resources {
            if let Err(err) = resource.channel().close().await {
                error!(name = %resource.name(), error = %err, "Failed to close channel");
            }
        }
    }
}

impl std::fmt::Debug for GatewayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayService")
            .field("resources", &self.resources.len())
            .field("open_timeout", &self.open_timeout)
            .finish_non_exhaustive()
    }
}
