use anyhow::{Context, Result};
use clap::Parser;
use solarman_exporter::{
    client::SolarmanClient, config::Settings, metrics::ScrapeCollector, server::start_server,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Solarman Exporter - Prometheus metrics exporter for Solarman inverters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the server
    #[arg(short, long, default_value = ":9230")]
    bind: String,

    /// Path to an optional configuration file (environment variables win)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("Starting Solarman Exporter v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load(args.config.as_deref()).context("failed to parse config")?;
    info!("Solarman API: {}", settings.api_url);
    info!("Inverter: {}", settings.inverter_sn);

    // Create and authenticate Solarman client
    let inverter_sn = settings.inverter_sn.clone();
    let client = SolarmanClient::new(settings)
        .await
        .context("error creating client")?;
    info!("Solarman client authenticated");

    // Create scrape collector
    let collector = ScrapeCollector::new(Arc::new(client), inverter_sn)?;
    info!("Scrape collector initialized");

    if let Err(e) = start_server(&args.bind, collector).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// Initialize structured logging with tracing.
fn init_logging(log_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
