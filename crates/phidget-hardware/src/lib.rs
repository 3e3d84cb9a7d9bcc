//! Named-resource lifecycle and event dispatch for phidget-gateway.
//!
//! - [`ResourceRegistry`] binds names to open hardware channels
//! - [`WebhookRegistry`] keeps per-name subscriber URLs
//! - [`EventDispatcher`] receives hardware callbacks, resolves them back to
//!   names and fans state changes out to subscribers over a
//!   [`WebhookTransport`]

pub mod dispatcher;
pub mod registry;
pub mod resource;
pub mod transport;
pub mod webhooks;

pub use dispatcher::{DeliverySnapshot, DeliveryStats, EventDispatcher};
pub use registry::{OpenRequest, ResourceRegistry};
pub use resource::{NamedResource, ResourceStatus, StatusReading};
pub use transport::{HttpWebhookTransport, StateChangeEvent, WebhookError, WebhookTransport};
pub use webhooks::WebhookRegistry;
