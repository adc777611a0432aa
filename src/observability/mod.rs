// Observability: diagnostics events from the engine and pipeline metrics

pub mod diagnostics;
pub mod metrics;

pub use diagnostics::{DiagnosticEvent, DiagnosticsSink, MemorySink, NullSink, TracingSink};
pub use metrics::init_metrics;
