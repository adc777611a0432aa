//! Structured diagnostics reported by the normalisation core.
//!
//! The engine never logs directly. Callers hand it a [`DiagnosticsSink`] and
//! decide where events go: `tracing` in the CLI, an in-memory buffer in tests.

use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// The relevance filter kept `selected` of `total` predicates for a batch
    PredicatesSelected {
        metric: String,
        selected: usize,
        total: usize,
    },
    /// No predicate applies to the batch; the metric is absent, not zero
    MetricNotComputable {
        metric: String,
        sources: Vec<String>,
        years: Vec<i32>,
    },
    /// A predicate with no axis requirements was configured
    CatchAllPredicate { metric: String, source: String },
    /// Matched rows dropped because they carry no global id
    UnmappedRowsDropped { metric: String, rows: usize },
    /// A row failed validation and was left out of the batch
    RowRejected {
        source: String,
        institution_id: String,
        reason: String,
    },
    /// Source-local ids with no global id in the identifier map
    IdsUnmapped {
        source: String,
        rows: usize,
        sample: Vec<String>,
    },
}

pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::PredicatesSelected {
                metric,
                selected,
                total,
            } => debug!(%metric, selected, total, "Selected relevant predicates"),
            DiagnosticEvent::MetricNotComputable {
                metric,
                sources,
                years,
            } => info!(%metric, ?sources, ?years, "Metric not computable for batch"),
            DiagnosticEvent::CatchAllPredicate { metric, source } => {
                warn!(%metric, %source, "Predicate has no requirements and matches every row")
            }
            DiagnosticEvent::UnmappedRowsDropped { metric, rows } => {
                warn!(%metric, rows, "Dropped matched rows without a global id")
            }
            DiagnosticEvent::RowRejected {
                source,
                institution_id,
                reason,
            } => debug!(%source, %institution_id, %reason, "Rejected row"),
            DiagnosticEvent::IdsUnmapped {
                source,
                rows,
                sample,
            } => warn!(%source, rows, ?sample, "Institution ids not mapped"),
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

/// Buffers events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticsSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
