//! # Solarman Exporter
//!
//! A Prometheus metrics exporter for solar inverters connected to the
//! Solarman cloud.
//!
//! ## Overview
//!
//! Every scrape of `/metrics` triggers one call to the Solarman
//! `currentData` endpoint and republishes a handful of readings:
//!
//! - Rated and current AC output power
//! - Cumulative and daily production
//! - Inverter temperature
//! - `up` and scrape duration of the exporter itself
//!
//! ## Quick Start
//!
//! ```no_run
//! use solarman_exporter::{config::Settings, client::SolarmanClient, metrics::ScrapeCollector, server::start_server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration from APP_ID, APP_SECRET, EMAIL, PASSWORD and SN
//!     let settings = Settings::load(None)?;
//!     let inverter_sn = settings.inverter_sn.clone();
//!
//!     // Authenticate against Solarman
//!     let client = SolarmanClient::new(settings).await?;
//!
//!     let collector = ScrapeCollector::new(Arc::new(client), inverter_sn)?;
//!
//!     // Start HTTP server
//!     start_server(":9230", collector).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`client`] - Solarman API client and telemetry model
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling
//! - [`metrics`] - Metric descriptors and scrape collection
//! - [`server`] - HTTP server for exposing metrics

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use error::{Result, SolarmanError};
