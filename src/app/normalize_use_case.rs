use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::ports::{BatchSourcePort, TableOutputPort};
use crate::observability::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::observability::metrics;
use crate::pipeline::ingestion::{Batch, BatchKey, IdMap, LoadedBatch, MappingReport};
use crate::pipeline::processing::normalize::MetricRegistry;
use crate::pipeline::processing::quality_gate::{DefaultQualityGate, QualityGate, RowRejection};
use crate::pipeline::processing::{MetricPipeline, MetricRunSummary, PipelineOutput};

const REJECTION_SAMPLE: usize = 10;

/// Outcome of one source/year batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub batch: String,
    pub source: String,
    pub year: Option<i32>,
    /// Output already existed and `force` was not set
    pub skipped: bool,
    pub rows_loaded: usize,
    pub records_unparseable: usize,
    pub rows_rejected: usize,
    pub rejection_sample: Vec<String>,
    pub mapping: Option<MappingReport>,
    pub metrics: Vec<MetricRunSummary>,
    pub output: Option<PathBuf>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn skipped(run_id: Uuid, key: &BatchKey) -> Self {
        Self {
            run_id,
            batch: key.file_stem(),
            source: key.source.clone(),
            year: key.year,
            skipped: true,
            rows_loaded: 0,
            records_unparseable: 0,
            rows_rejected: 0,
            rejection_sample: Vec::new(),
            mapping: None,
            metrics: Vec::new(),
            output: None,
            finished_at: Utc::now(),
        }
    }

    pub fn rows_unmapped(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.unmapped_rows)
    }

    pub fn computed_metrics(&self) -> Vec<&str> {
        self.metrics
            .iter()
            .filter(|m| m.computable)
            .map(|m| m.metric.as_str())
            .collect()
    }

    pub fn not_computable_metrics(&self) -> Vec<&str> {
        self.metrics
            .iter()
            .filter(|m| !m.computable)
            .map(|m| m.metric.as_str())
            .collect()
    }
}

/// Everything the synchronous part of a batch run produces
#[derive(Debug, Clone)]
pub struct ProcessedBatch {
    pub output: PipelineOutput,
    pub rows_loaded: usize,
    pub records_unparseable: usize,
    pub rejections: Vec<RowRejection>,
    pub load_rejections: Vec<String>,
    pub mapping: Option<MappingReport>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<BatchReport>,
    /// `(batch, error)` for batches that could not be completed
    pub failures: Vec<(String, String)>,
}

/// Validates, maps and normalises extracted batches, then writes one wide
/// table per batch.
#[derive(Clone)]
pub struct NormalizeUseCase {
    run_id: Uuid,
    registry: Arc<MetricRegistry>,
    pipeline: MetricPipeline,
    id_maps: Arc<BTreeMap<String, IdMap>>,
    source_port: Arc<dyn BatchSourcePort>,
    output: Arc<dyn TableOutputPort>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl NormalizeUseCase {
    pub fn new(
        registry: Arc<MetricRegistry>,
        pipeline: MetricPipeline,
        source_port: Arc<dyn BatchSourcePort>,
        output: Arc<dyn TableOutputPort>,
    ) -> Self {
        let sink = pipeline.normaliser().sink().clone();
        Self {
            run_id: Uuid::new_v4(),
            registry,
            pipeline,
            id_maps: Arc::new(BTreeMap::new()),
            source_port,
            output,
            sink,
        }
    }

    /// Identifier maps keyed by source
    pub fn with_id_maps(mut self, id_maps: BTreeMap<String, IdMap>) -> Self {
        self.id_maps = Arc::new(id_maps);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Gate, map and normalise one loaded batch. Pure CPU work; run it on the blocking pool.
    pub fn process(&self, source: &str, loaded: LoadedBatch) -> ProcessedBatch {
        let rows_loaded = loaded.rows.len();
        let records_unparseable = loaded.rejections.len();
        metrics::ingestion::rows_loaded(source, rows_loaded);
        if records_unparseable > 0 {
            metrics::ingestion::records_unparseable(source, records_unparseable);
        }
        let load_rejections = loaded
            .rejections
            .iter()
            .map(|r| format!("{}:{}: {}", r.path, r.line, r.reason))
            .collect();

        let validated = DefaultQualityGate::for_source(source).partition(loaded.rows);
        for rejection in &validated.rejections {
            self.sink.emit(DiagnosticEvent::RowRejected {
                source: rejection.source.clone(),
                institution_id: rejection.institution_id.clone(),
                reason: rejection.reason.clone(),
            });
        }
        if validated.rejected_count() > 0 {
            metrics::quality_gate::rows_rejected(source, validated.rejected_count());
        }

        let mut rows = validated.accepted;
        let mapping = self.id_maps.get(source).map(|map| {
            let report = map.apply(&mut rows);
            if report.unmapped_rows > 0 {
                self.sink.emit(DiagnosticEvent::IdsUnmapped {
                    source: source.to_string(),
                    rows: report.unmapped_rows,
                    sample: report.unmapped_sample.clone(),
                });
                metrics::normalise::rows_unmapped(source, report.unmapped_rows);
            }
            report
        });

        let output = self.pipeline.run(&rows, self.registry.definitions_for(source));
        for summary in &output.summaries {
            if summary.computable {
                metrics::normalise::metric_computed(source, &summary.metric);
            } else {
                metrics::normalise::metric_not_computable(source, &summary.metric);
            }
        }
        metrics::normalise::batch_processed(source, rows.len());

        ProcessedBatch {
            output,
            rows_loaded,
            records_unparseable,
            rejections: validated.rejections,
            load_rejections,
            mapping,
        }
    }

    /// Normalise one batch and write its table. Skips batches whose output
    /// already exists unless `force` is set.
    pub async fn run_batch(&self, batch: Batch, force: bool) -> Result<BatchReport> {
        let name = batch.key.file_stem();
        if !force && self.output.exists(&name).await {
            info!(batch = %name, "Output exists, skipping batch");
            return Ok(BatchReport::skipped(self.run_id, &batch.key));
        }

        let loaded = self
            .source_port
            .load_batch(&batch)
            .await
            .with_context(|| format!("Failed to load batch {}", name))?;

        let this = self.clone();
        let source = batch.key.source.clone();
        let processed = tokio::task::spawn_blocking(move || this.process(&source, loaded))
            .await
            .with_context(|| format!("Normalisation task for {} did not complete", name))?;

        let path = self
            .output
            .write_table(&name, &processed.output.table)
            .await
            .with_context(|| format!("Failed to write table for {}", name))?;

        let rejection_sample = processed
            .load_rejections
            .iter()
            .cloned()
            .chain(processed.rejections.iter().map(|r| {
                format!("{} {} {}: {}", r.source, r.institution_id, r.year, r.reason)
            }))
            .take(REJECTION_SAMPLE)
            .collect();

        let report = BatchReport {
            run_id: self.run_id,
            batch: name,
            source: batch.key.source.clone(),
            year: batch.key.year,
            skipped: false,
            rows_loaded: processed.rows_loaded,
            records_unparseable: processed.records_unparseable,
            rows_rejected: processed.rejections.len(),
            rejection_sample,
            mapping: processed.mapping,
            metrics: processed.output.summaries,
            output: Some(path),
            finished_at: Utc::now(),
        };

        info!(
            batch = %report.batch,
            rows = report.rows_loaded,
            unparseable = report.records_unparseable,
            rejected = report.rows_rejected,
            unmapped = report.rows_unmapped(),
            computed = report.computed_metrics().len(),
            not_computable = report.not_computable_metrics().len(),
            "Batch normalised"
        );
        if report.rows_rejected > 0 || report.records_unparseable > 0 {
            warn!(batch = %report.batch, sample = ?report.rejection_sample, "Rows rejected");
        }
        Ok(report)
    }

    /// Run every available batch concurrently. One failing batch does not stop the others.
    pub async fn run_all(&self, force: bool) -> Result<RunSummary> {
        let batches = self.source_port.list_batches().await?;
        info!(run_id = %self.run_id, batches = batches.len(), "Starting normalisation run");

        let mut tasks = JoinSet::new();
        for batch in batches {
            let this = self.clone();
            tasks.spawn(async move {
                let name = batch.key.file_stem();
                (name, this.run_batch(batch, force).await)
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(report))) => summary.reports.push(report),
                Ok((name, Err(e))) => {
                    error!(batch = %name, "Batch failed: {:#}", e);
                    summary.failures.push((name, format!("{:#}", e)));
                }
                Err(e) => {
                    error!("Batch task aborted: {}", e);
                    summary.failures.push(("<unknown>".to_string(), e.to_string()));
                }
            }
        }
        summary.reports.sort_by(|a, b| a.batch.cmp(&b.batch));
        summary.failures.sort();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::diagnostics::MemorySink;
    use crate::pipeline::processing::normalize::{
        CategoryPredicate, GroupBy, MetricDefinition, Normaliser, YearSpan,
    };
    use crate::pipeline::processing::WideTable;
    use crate::types::ObservationRow;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MockBatchSource {
        batches: HashMap<String, Vec<ObservationRow>>,
    }

    #[async_trait]
    impl BatchSourcePort for MockBatchSource {
        async fn list_batches(&self) -> Result<Vec<Batch>> {
            Ok(self
                .batches
                .values()
                .map(|rows| Batch {
                    key: BatchKey {
                        source: rows[0].source.clone(),
                        year: Some(rows[0].year),
                    },
                    files: Vec::new(),
                })
                .collect())
        }

        async fn load_batch(&self, batch: &Batch) -> Result<LoadedBatch> {
            Ok(LoadedBatch {
                rows: self.batches[&batch.key.file_stem()].clone(),
                rejections: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct MockTableOutput {
        tables: tokio::sync::Mutex<HashMap<String, WideTable>>,
    }

    #[async_trait]
    impl TableOutputPort for MockTableOutput {
        async fn exists(&self, name: &str) -> bool {
            self.tables.lock().await.contains_key(name)
        }

        async fn write_table(&self, name: &str, table: &WideTable) -> Result<PathBuf> {
            self.tables.lock().await.insert(name.to_string(), table.clone());
            Ok(PathBuf::from(format!("{}.csv", name)))
        }
    }

    fn hesa_row(id: &str, sex: &str, count: f64) -> ObservationRow {
        ObservationRow {
            institution_id: id.to_string(),
            institution_name: format!("Institution {}", id),
            source: "uk_hesa".to_string(),
            year: 2016,
            category_type: vec!["sex".to_string(), "contract_marker".to_string()],
            category_value: vec![sex.to_string(), "Academic".to_string()],
            count_type: None,
            count,
            global_id: None,
        }
    }

    fn registry() -> MetricRegistry {
        let academic = || {
            CategoryPredicate::builder("uk_hesa", YearSpan::range(2015, 2021))
                .require("contract_marker", ["Academic"])
        };
        let mut registry = MetricRegistry::new();
        registry
            .register(MetricDefinition::new("academic_total_count", vec![academic().build().unwrap()]).unwrap())
            .unwrap();
        registry
            .register(
                MetricDefinition::new(
                    "academic_women_count",
                    vec![academic().require("sex", ["Female"]).build().unwrap()],
                )
                .unwrap(),
            )
            .unwrap();
        registry.validate().unwrap();
        registry
    }

    fn use_case(
        rows: Vec<ObservationRow>,
        output: Arc<MockTableOutput>,
        group_by: GroupBy,
        sink: Arc<MemorySink>,
    ) -> NormalizeUseCase {
        let source = MockBatchSource {
            batches: HashMap::from([("uk_hesa_2016".to_string(), rows)]),
        };
        NormalizeUseCase::new(
            Arc::new(registry()),
            MetricPipeline::new(Normaliser::new(group_by, sink)),
            Arc::new(source),
            output,
        )
    }

    #[tokio::test]
    async fn test_run_all_normalises_and_writes() {
        let output = Arc::new(MockTableOutput::default());
        let mut bad = hesa_row("I1", "Female", 1.0);
        bad.count = -1.0;
        let rows = vec![hesa_row("I1", "Female", 10.0), hesa_row("I1", "Male", 15.0), bad];
        let sink = Arc::new(MemorySink::new());

        let summary = use_case(rows, output.clone(), GroupBy::SourceId, sink.clone())
            .run_all(false)
            .await
            .unwrap();

        assert!(summary.failures.is_empty());
        let report = &summary.reports[0];
        assert_eq!(report.rows_loaded, 3);
        assert_eq!(report.rows_rejected, 1);
        assert!(report.computed_metrics().contains(&"academic_total_count"));

        let tables = output.tables.lock().await;
        let table = &tables["uk_hesa_2016"];
        assert_eq!(table.value("I1", 2016, "academic_total_count"), Some(25.0));
        assert_eq!(table.value("I1", 2016, "academic_women_count"), Some(10.0));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::RowRejected { .. })));
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped_unless_forced() {
        let output = Arc::new(MockTableOutput::default());
        output
            .tables
            .lock()
            .await
            .insert("uk_hesa_2016".to_string(), WideTable::default());
        let uc = use_case(
            vec![hesa_row("I1", "Female", 10.0)],
            output.clone(),
            GroupBy::SourceId,
            Arc::new(MemorySink::new()),
        );

        let summary = uc.run_all(false).await.unwrap();
        assert!(summary.reports[0].skipped);
        assert!(output.tables.lock().await["uk_hesa_2016"].is_empty());

        let summary = uc.run_all(true).await.unwrap();
        assert!(!summary.reports[0].skipped);
        assert_eq!(output.tables.lock().await["uk_hesa_2016"].len(), 1);
    }

    #[tokio::test]
    async fn test_global_id_grouping_reports_unmapped() {
        let output = Arc::new(MockTableOutput::default());
        let sink = Arc::new(MemorySink::new());
        let uc = use_case(
            vec![hesa_row("I1", "Female", 10.0), hesa_row("I2", "Female", 3.0)],
            output.clone(),
            GroupBy::GlobalId,
            sink.clone(),
        )
        .with_id_maps(BTreeMap::from([(
            "uk_hesa".to_string(),
            IdMap::from_pairs([("I1", "grid.1")]),
        )]));

        let summary = uc.run_all(false).await.unwrap();

        let report = &summary.reports[0];
        assert_eq!(report.rows_unmapped(), 1);
        let tables = output.tables.lock().await;
        assert_eq!(tables["uk_hesa_2016"].value("grid.1", 2016, "academic_total_count"), Some(10.0));
        assert_eq!(tables["uk_hesa_2016"].len(), 1);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, DiagnosticEvent::IdsUnmapped { rows: 1, .. })));
    }
}
