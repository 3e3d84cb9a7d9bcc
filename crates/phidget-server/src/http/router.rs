//! Route table and server loop.

use super::handlers;
use crate::service::GatewayService;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct HttpState {
    /// Gateway operations
    pub service: Arc<GatewayService>,
    /// `<title>` of the HTML state page
    pub state_page_title: Arc<str>,
}

/// Build the gateway router.
pub fn create_router(service: Arc<GatewayService>, state_page_title: &str) -> Router {
    let state = HttpState {
        service,
        state_page_title: Arc::from(state_page_title),
    };

    Router::new()
        .route("/", get(handlers::root_redirect))
        .route("/health", get(handlers::health))
        .route("/phidgets/digital_out", post(handlers::set_digital_output))
        .route("/phidgets/voltage_out", post(handlers::set_voltage_output))
        .route("/phidgets/digital_in", post(handlers::open_digital_input))
        .route("/phidgets/close", post(handlers::close_channel))
        .route("/phidgets/state", get(handlers::state_page))
        .route("/phidgets/state.json", get(handlers::state_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
