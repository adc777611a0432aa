//! Prometheus-style counters for the normalisation pipeline.
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests that never call [`init_metrics`] pay nothing.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const METRICS_ADDR_ENV: &str = "DIVERSITY_METRICS_ADDR";

/// Every metric name the pipeline records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RowsLoaded,
    RecordsUnparseable,
    RowsRejected,
    RowsUnmapped,
    MetricsComputed,
    MetricsNotComputable,
    BatchesProcessed,
    BatchSize,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RowsLoaded => "diversity_rows_loaded_total",
            MetricName::RecordsUnparseable => "diversity_records_unparseable_total",
            MetricName::RowsRejected => "diversity_rows_rejected_total",
            MetricName::RowsUnmapped => "diversity_rows_unmapped_total",
            MetricName::MetricsComputed => "diversity_metrics_computed_total",
            MetricName::MetricsNotComputable => "diversity_metrics_not_computable_total",
            MetricName::BatchesProcessed => "diversity_batches_processed_total",
            MetricName::BatchSize => "diversity_batch_size",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter when `DIVERSITY_METRICS_ADDR` is set.
///
/// Returns whether an exporter is listening. Must run inside the tokio runtime.
pub fn init_metrics() -> bool {
    let Ok(raw) = std::env::var(METRICS_ADDR_ENV) else {
        return false;
    };
    let addr: SocketAddr = match raw.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Ignoring {}='{}': {}", METRICS_ADDR_ENV, raw, e);
            return false;
        }
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => {
            info!("Prometheus exporter listening at http://{}/metrics", addr);
            true
        }
        Err(e) => {
            warn!("Failed to install Prometheus exporter: {}", e);
            false
        }
    }
}

pub mod ingestion {
    use super::MetricName;

    pub fn rows_loaded(source: &str, rows: usize) {
        ::metrics::counter!(MetricName::RowsLoaded.as_str(), "source" => source.to_string())
            .increment(rows as u64);
    }

    pub fn records_unparseable(source: &str, records: usize) {
        ::metrics::counter!(MetricName::RecordsUnparseable.as_str(), "source" => source.to_string())
            .increment(records as u64);
    }
}

pub mod quality_gate {
    use super::MetricName;

    pub fn rows_rejected(source: &str, rows: usize) {
        ::metrics::counter!(MetricName::RowsRejected.as_str(), "source" => source.to_string())
            .increment(rows as u64);
    }
}

pub mod normalise {
    use super::MetricName;

    pub fn rows_unmapped(source: &str, rows: usize) {
        ::metrics::counter!(MetricName::RowsUnmapped.as_str(), "source" => source.to_string())
            .increment(rows as u64);
    }

    pub fn metric_computed(source: &str, metric: &str) {
        ::metrics::counter!(
            MetricName::MetricsComputed.as_str(),
            "source" => source.to_string(),
            "metric" => metric.to_string()
        )
        .increment(1);
    }

    pub fn metric_not_computable(source: &str, metric: &str) {
        ::metrics::counter!(
            MetricName::MetricsNotComputable.as_str(),
            "source" => source.to_string(),
            "metric" => metric.to_string()
        )
        .increment(1);
    }

    pub fn batch_processed(source: &str, rows: usize) {
        ::metrics::counter!(MetricName::BatchesProcessed.as_str(), "source" => source.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::BatchSize.as_str(), "source" => source.to_string())
            .record(rows as f64);
    }
}
