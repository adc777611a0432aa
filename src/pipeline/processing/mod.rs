// Pipeline processing: row validation, normalisation, joining and percentages

pub mod metric_pipeline;
pub mod normalize;
pub mod quality_gate;
pub mod wide_table;

pub use metric_pipeline::{MetricPipeline, MetricRunSummary, PipelineOutput};
pub use wide_table::{PercentageSpec, RowKey, WideRow, WideTable};
