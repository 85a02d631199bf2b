//! Prometheus metrics definitions and scrape-time collection.
//!
//! Every scrape fetches one current data snapshot from Solarman and turns the
//! readings listed in [`READINGS`] into samples. Samples are gathered from a
//! fresh registry per scrape, so a failed scrape exposes only `up` and the
//! scrape duration instead of stale readings.

use crate::client::{CurrentData, SolarmanClient, TelemetrySource};
use crate::error::{Result, SolarmanError};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub const NAMESPACE: &str = "solarman";
pub const SUBSYSTEM: &str = "inverter";

/// Prometheus type of an exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Static description of one exported metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    /// Name without namespace and subsystem
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Solarman reading key the value comes from, if any
    pub key: Option<&'static str>,
}

pub static UP: MetricSpec = MetricSpec {
    name: "up",
    help: "Exporter is being able to talk with Solarman API",
    kind: MetricKind::Gauge,
    key: None,
};

pub static SCRAPE_DURATION: MetricSpec = MetricSpec {
    name: "scrape_duration_seconds",
    help: "Scrape duration",
    kind: MetricKind::Gauge,
    key: None,
};

/// Readings exported on a successful scrape.
pub static READINGS: [MetricSpec; 5] = [
    MetricSpec {
        name: "rated_power_watts",
        help: "Rated power",
        kind: MetricKind::Gauge,
        key: Some("Pr1"),
    },
    MetricSpec {
        name: "output_power_watts",
        help: "Total AC Output Power (Active)",
        kind: MetricKind::Gauge,
        key: Some("APo_t1"),
    },
    MetricSpec {
        name: "cumulative_production_kwh_total",
        help: "Cumulative Production (Active)",
        kind: MetricKind::Counter,
        key: Some("Et_ge0"),
    },
    MetricSpec {
        name: "daily_production_kwh_total",
        help: "Daily Production (Active)",
        kind: MetricKind::Counter,
        key: Some("Etdy_ge1"),
    },
    MetricSpec {
        name: "temperature_celcius",
        help: "Temperature",
        kind: MetricKind::Gauge,
        key: Some("T_AC_RDT1"),
    },
];

fn metric_opts(spec: &MetricSpec) -> Opts {
    Opts::new(spec.name, spec.help)
        .namespace(NAMESPACE)
        .subsystem(SUBSYSTEM)
}

/// Register one sample of `spec` with `value` in `registry`.
fn record(registry: &Registry, spec: &MetricSpec, value: f64) -> Result<()> {
    let opts = metric_opts(spec);
    let collector: Box<dyn Collector> = match spec.kind {
        MetricKind::Gauge => {
            let gauge = Gauge::with_opts(opts)?;
            gauge.set(value);
            Box::new(gauge)
        }
        MetricKind::Counter => {
            let counter = Counter::with_opts(opts)?;
            // Counters only move up; zero, negative and NaN readings stay at 0.
            if value > 0.0 {
                counter.inc_by(value);
            } else if value != 0.0 {
                debug!("Clamping {} reading {} to 0", spec.name, value);
            }
            Box::new(counter)
        }
    };
    registry.register(collector)?;
    Ok(())
}

/// Scrape collector for one inverter.
///
/// Concurrent calls to [`ScrapeCollector::collect`] are serialized, so the
/// Solarman API sees at most one in-flight request from this exporter.
pub struct ScrapeCollector<S: TelemetrySource = SolarmanClient> {
    source: Arc<S>,
    inverter_sn: String,
    lock: Mutex<()>,
    descs: Vec<Desc>,
}

impl<S: TelemetrySource> ScrapeCollector<S> {
    /// Create a new scrape collector.
    pub fn new(source: Arc<S>, inverter_sn: impl Into<String>) -> Result<Self> {
        let descs = Self::all_specs()
            .map(|spec| {
                let opts = metric_opts(spec);
                Desc::new(opts.fq_name(), opts.help.clone(), vec![], HashMap::new())
                    .map_err(SolarmanError::from)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source,
            inverter_sn: inverter_sn.into(),
            lock: Mutex::new(()),
            descs,
        })
    }

    fn all_specs() -> impl Iterator<Item = &'static MetricSpec> {
        [&UP, &SCRAPE_DURATION].into_iter().chain(READINGS.iter())
    }

    /// Descriptors of every metric [`ScrapeCollector::collect`] can emit.
    pub fn describe(&self) -> Vec<Desc> {
        self.descs.clone()
    }

    /// Serial number of the inverter this collector polls.
    pub fn inverter_sn(&self) -> &str {
        &self.inverter_sn
    }

    /// Run one scrape and return the gathered metric families.
    ///
    /// Never fails: upstream errors are logged and reported as `up 0`.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let _guard = self.lock.lock().await;
        info!("Collecting metrics from Solarman");

        let start = Instant::now();
        let registry = Registry::new();

        if let Err(e) = self.collect_into(&registry).await {
            error!("Failed to record metrics: {}", e);
        }

        let elapsed = start.elapsed().as_secs_f64();
        if let Err(e) = record(&registry, &SCRAPE_DURATION, elapsed) {
            error!("Failed to record scrape duration: {}", e);
        }
        debug!("Scrape finished in {:.3}s", elapsed);

        registry.gather()
    }

    async fn collect_into(&self, registry: &Registry) -> Result<()> {
        match self.source.current_data(&self.inverter_sn).await {
            Ok(data) => {
                self.record_readings(registry, &data)?;
                record(registry, &UP, 1.0)?;
                info!("Successfully collected metrics");
            }
            Err(e) => {
                error!("Failed to collect metrics: {}", e);
                record(registry, &UP, 0.0)?;
            }
        }
        Ok(())
    }

    fn record_readings(&self, registry: &Registry, data: &CurrentData) -> Result<()> {
        debug!(
            "Updating inverter metrics from {} readings",
            data.data_list.len()
        );
        for spec in READINGS.iter() {
            let value = spec.key.map(|key| data.value(key)).unwrap_or(0.0);
            record(registry, spec, value)?;
        }
        Ok(())
    }

    /// Run one scrape and render it in Prometheus text format.
    pub async fn scrape(&self) -> Result<String> {
        let families = self.collect().await;
        encode(&families)
    }
}

/// Encode metric families in Prometheus text format.
pub fn encode(families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::with_capacity(1024);

    encoder
        .encode(families, &mut buffer)
        .map_err(|e| SolarmanError::Metrics(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| SolarmanError::Metrics(e.to_string()))
}
