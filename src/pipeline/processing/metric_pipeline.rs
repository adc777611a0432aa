use serde::Serialize;

use crate::types::ObservationRow;

use super::normalize::{MetricDefinition, MetricTable, Normaliser};
use super::wide_table::{PercentageSpec, WideTable};

/// Per-metric outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRunSummary {
    pub metric: String,
    pub computable: bool,
    pub groups: usize,
    pub matched_rows: usize,
    pub unmapped_rows: usize,
}

impl From<&MetricTable> for MetricRunSummary {
    fn from(table: &MetricTable) -> Self {
        Self {
            metric: table.metric.clone(),
            computable: table.computable,
            groups: table.len(),
            matched_rows: table.matched_rows,
            unmapped_rows: table.unmapped_rows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: WideTable,
    pub summaries: Vec<MetricRunSummary>,
}

impl PipelineOutput {
    pub fn computed_metrics(&self) -> Vec<String> {
        self.summaries
            .iter()
            .filter(|s| s.computable)
            .map(|s| s.metric.clone())
            .collect()
    }

    pub fn not_computable_metrics(&self) -> Vec<String> {
        self.summaries
            .iter()
            .filter(|s| !s.computable)
            .map(|s| s.metric.clone())
            .collect()
    }
}

/// Runs the engine once per metric definition and joins the results
#[derive(Debug, Clone, Default)]
pub struct MetricPipeline {
    normaliser: Normaliser,
}

impl MetricPipeline {
    pub fn new(normaliser: Normaliser) -> Self {
        Self { normaliser }
    }

    pub fn normaliser(&self) -> &Normaliser {
        &self.normaliser
    }

    pub fn run(&self, rows: &[ObservationRow], definitions: &[MetricDefinition]) -> PipelineOutput {
        let tables: Vec<MetricTable> = definitions
            .iter()
            .map(|definition| self.normaliser.normalise(rows, definition))
            .collect();

        PipelineOutput {
            table: WideTable::from_metric_tables(&tables),
            summaries: tables.iter().map(MetricRunSummary::from).collect(),
        }
    }

    pub fn percentages(table: &WideTable, specs: &[PercentageSpec], decimals: u32) -> WideTable {
        table.with_percentages(specs, decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::{CategoryPredicate, YearSpan};

    fn row(sex: &str, count: f64) -> ObservationRow {
        ObservationRow {
            institution_id: "I1".to_string(),
            institution_name: "Institution One".to_string(),
            source: "uk_hesa".to_string(),
            year: 2016,
            category_type: vec!["sex".to_string(), "contract_marker".to_string()],
            category_value: vec![sex.to_string(), "Academic".to_string()],
            count_type: None,
            count,
            global_id: None,
        }
    }

    #[test]
    fn test_run_reports_not_computable_metrics() {
        let total = MetricDefinition::new(
            "academic_total_count",
            vec![CategoryPredicate::builder("uk_hesa", YearSpan::range(2015, 2021))
                .require("contract_marker", ["Academic"])
                .build()
                .unwrap()],
        )
        .unwrap();
        let old_only = MetricDefinition::new(
            "academic_women_count",
            vec![CategoryPredicate::builder("uk_hesa", YearSpan::range(2009, 2013))
                .require("gender", ["female"])
                .build()
                .unwrap()],
        )
        .unwrap();

        let output = MetricPipeline::default().run(&[row("Female", 10.0), row("Male", 15.0)], &[total, old_only]);

        assert_eq!(output.computed_metrics(), vec!["academic_total_count".to_string()]);
        assert_eq!(output.not_computable_metrics(), vec!["academic_women_count".to_string()]);
        assert_eq!(output.table.value("I1", 2016, "academic_total_count"), Some(25.0));
        assert_eq!(output.table.value("I1", 2016, "academic_women_count"), None);
    }
}
