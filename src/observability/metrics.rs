//! Metrics for the ancestry pipeline.
//!
//! Counters are recorded through the `metrics` facade; nothing is exported
//! unless `init_metrics` installed a Prometheus listener.

use crate::constants::METRICS_PORT_VAR;
use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// All metric names used in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RecordsRead,
    RecordsWritten,
    RecordsExcluded,
    FieldsRedacted,
    SurnamesCanonicalized,
    GeocodeCacheHits,
    GeocodeProviderCalls,
    GeocodeTimeouts,
    GeocodeUnresolved,
    PipelineDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsRead => "ancestry_records_read_total",
            MetricName::RecordsWritten => "ancestry_records_written_total",
            MetricName::RecordsExcluded => "ancestry_records_excluded_total",
            MetricName::FieldsRedacted => "ancestry_fields_redacted_total",
            MetricName::SurnamesCanonicalized => "ancestry_surnames_canonicalized_total",
            MetricName::GeocodeCacheHits => "ancestry_geocode_cache_hits_total",
            MetricName::GeocodeProviderCalls => "ancestry_geocode_provider_calls_total",
            MetricName::GeocodeTimeouts => "ancestry_geocode_timeouts_total",
            MetricName::GeocodeUnresolved => "ancestry_geocode_unresolved_total",
            MetricName::PipelineDuration => "ancestry_pipeline_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter when `ANCESTRY_METRICS_PORT` is set.
pub fn init_metrics() {
    let port: u16 = match std::env::var(METRICS_PORT_VAR)
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(port) => port,
        None => return,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed: {}", e),
    }
}

pub mod records {
    use super::MetricName;

    pub fn read(count: usize) {
        ::metrics::counter!(MetricName::RecordsRead.as_str()).increment(count as u64);
    }

    pub fn written(sink: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RecordsWritten.as_str(), "sink" => sink).increment(count as u64);
    }

    pub fn excluded(count: usize) {
        ::metrics::counter!(MetricName::RecordsExcluded.as_str()).increment(count as u64);
    }

    pub fn fields_redacted(count: usize) {
        ::metrics::counter!(MetricName::FieldsRedacted.as_str()).increment(count as u64);
    }

    pub fn surname_canonicalized() {
        ::metrics::counter!(MetricName::SurnamesCanonicalized.as_str()).increment(1);
    }
}

pub mod geocode {
    use super::MetricName;

    pub fn cache_hit() {
        ::metrics::counter!(MetricName::GeocodeCacheHits.as_str()).increment(1);
    }

    pub fn provider_call() {
        ::metrics::counter!(MetricName::GeocodeProviderCalls.as_str()).increment(1);
    }

    pub fn timeout() {
        ::metrics::counter!(MetricName::GeocodeTimeouts.as_str()).increment(1);
    }

    pub fn unresolved() {
        ::metrics::counter!(MetricName::GeocodeUnresolved.as_str()).increment(1);
    }
}

pub fn pipeline_duration(secs: f64) {
    ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
}
