use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::{TableInputPort, TableOutputPort};
use crate::pipeline::processing::{MetricPipeline, PercentageSpec, WideTable};

#[derive(Debug, Clone, Serialize)]
pub struct CombineReport {
    pub tables_merged: usize,
    pub rows_in: usize,
    /// Rows left after dropping those without a usable denominator
    pub rows_out: usize,
    pub columns: Vec<String>,
    pub output: PathBuf,
}

/// Merges per-batch wide tables into one and applies the percentage stage
pub struct CombineUseCase {
    input: Arc<dyn TableInputPort>,
    output: Arc<dyn TableOutputPort>,
    specs: Vec<PercentageSpec>,
    decimals: u32,
}

impl CombineUseCase {
    pub fn new(
        input: Arc<dyn TableInputPort>,
        output: Arc<dyn TableOutputPort>,
        specs: Vec<PercentageSpec>,
        decimals: u32,
    ) -> Self {
        Self {
            input,
            output,
            specs,
            decimals,
        }
    }

    pub fn combine(tables: Vec<WideTable>) -> WideTable {
        let mut combined = WideTable::default();
        for table in tables {
            combined.merge(table);
        }
        combined
    }

    pub async fn run(&self, name: &str) -> Result<CombineReport> {
        let tables = self
            .input
            .read_tables()
            .await
            .context("Failed to read normalised tables")?;
        let tables_merged = tables.len();
        for (table_name, table) in &tables {
            info!(table = %table_name, rows = table.len(), "Merging table");
        }

        let combined = Self::combine(tables.into_iter().map(|(_, t)| t).collect());
        let rows_in = combined.len();
        let with_percentages = MetricPipeline::percentages(&combined, &self.specs, self.decimals);

        let output = self
            .output
            .write_table(name, &with_percentages)
            .await
            .with_context(|| format!("Failed to write combined table '{}'", name))?;

        let report = CombineReport {
            tables_merged,
            rows_in,
            rows_out: with_percentages.len(),
            columns: with_percentages.columns().to_vec(),
            output,
        };
        info!(
            tables = report.tables_merged,
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            "Combined table written"
        );
        Ok(report)
    }
}
