//! phidget-gateway executable
//!
//! Serves the gateway HTTP API on `0.0.0.0:<port>`.
//!
//! # Usage
//!
//! ```bash
//! phidget-gateway            # port 4002
//! phidget-gateway :4100      # leading ':' is accepted
//! phidget-gateway --config gateway.toml --log-level debug
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use phidget_core::ChannelFactory;
use phidget_driver_mock::MockHub;
use phidget_server::{config::GatewayConfig, logging, HardwareDriver};
use phidget_server::{create_router, serve, GatewayService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "phidget-gateway")]
#[command(about = "HTTP gateway for named Phidget channels", long_about = None)]
struct Cli {
    /// Listen port, optionally prefixed with ':' (default: 4002)
    #[arg(value_parser = parse_port)]
    port: Option<u16>,

    /// Configuration file (TOML)
    #[arg(long, env = "PHIDGET_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_port(arg: &str) -> Result<u16, String> {
    let digits = arg.strip_prefix(':').unwrap_or(arg);
    digits
        .parse()
        .map_err(|_| format!("invalid port '{}'", arg))
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("loading {}", path.display()),
        None => "loading configuration".to_string(),
    })?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn build_factory(config: &GatewayConfig) -> Arc<dyn ChannelFactory> {
    match config.hardware.driver {
        HardwareDriver::Mock => Arc::new(MockHub::with_config(config.hardware.mock.clone())),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let factory = build_factory(&config);
    let service = Arc::new(
        GatewayService::new(&config, factory).context("building gateway service")?,
    );
    service.open_startup_channels().await;

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!(%address, "Starting server");

    let router = create_router(service.clone(), &config.server.state_page_title);
    let served = serve(listener, router, shutdown_signal()).await;

    service.shutdown().await;
    served.context("HTTP server failed")?;
    info!("Gateway stopped");
    Ok(())
}
