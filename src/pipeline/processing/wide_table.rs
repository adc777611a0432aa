use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    ACADEMIC_INDIGENOUS_COUNT, ACADEMIC_INDIGENOUS_WOMEN_COUNT, ACADEMIC_TOTAL_COUNT,
    ACADEMIC_WHITE_COUNT, ACADEMIC_WOMEN_COUNT, MAX_DECIMALS, TOTAL_ACADEMIC_SHORT,
};
use crate::error::ConfigError;

use super::normalize::MetricTable;

/// Join key of the wide table. Source-local ids are only unique within a
/// source, so the source is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub institution_id: String,
    pub year: i32,
    pub source: String,
}

impl RowKey {
    pub fn new(institution_id: &str, year: i32, source: &str) -> Self {
        Self {
            institution_id: institution_id.to_string(),
            year,
            source: source.to_string(),
        }
    }
}

/// One institution-year. A column missing from `values` is null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideRow {
    pub institution_id: String,
    pub year: i32,
    pub source: String,
    pub institution_name: String,
    pub values: BTreeMap<String, f64>,
}

impl WideRow {
    pub fn new(institution_id: &str, year: i32, source: &str, institution_name: &str) -> Self {
        Self {
            institution_id: institution_id.to_string(),
            year,
            source: source.to_string(),
            institution_name: institution_name.to_string(),
            values: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(&self.institution_id, self.year, &self.source)
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }
}

/// Metrics side by side, one nullable column per metric, keyed by
/// `(institution_id, year, source)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    columns: Vec<String>,
    rows: BTreeMap<RowKey, WideRow>,
}

impl WideTable {
    pub fn new(columns: Vec<String>) -> Self {
        let mut table = Self::default();
        for column in columns {
            table.add_column(&column);
        }
        table
    }

    /// Outer join of per-metric tables
    pub fn from_metric_tables(tables: &[MetricTable]) -> Self {
        let mut wide = Self::default();
        for table in tables {
            wide.insert_metric(table);
        }
        wide
    }

    pub fn add_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    /// Add a metric as a column. A non-computable metric still gets its
    /// column; every cell in it stays null.
    pub fn insert_metric(&mut self, table: &MetricTable) {
        self.add_column(&table.metric);
        for (key, count) in &table.rows {
            let row_key = RowKey::new(&key.institution_id, key.year, &key.source);
            let row = self.rows.entry(row_key).or_insert_with(|| {
                WideRow::new(&key.institution_id, key.year, &key.source, &key.institution_name)
            });
            // Name variants of the same institution-year collapse into one cell
            *row.values.entry(table.metric.clone()).or_insert(0.0) += count;
        }
    }

    /// Insert or replace a whole row, registering any new columns it carries
    pub fn upsert_row(&mut self, row: WideRow) {
        for column in row.values.keys() {
            self.add_column(column);
        }
        self.rows.insert(row.key(), row);
    }

    /// Union of two tables. On a shared key, cells already present are kept
    /// and nulls are filled from `other`. Rows of different sources never
    /// share a key.
    pub fn merge(&mut self, other: WideTable) {
        for column in &other.columns {
            self.add_column(column);
        }
        for (key, row) in other.rows {
            match self.rows.get_mut(&key) {
                Some(existing) => {
                    for (column, value) in row.values {
                        existing.values.entry(column).or_insert(value);
                    }
                }
                None => {
                    self.rows.insert(key, row);
                }
            }
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> impl Iterator<Item = &WideRow> {
        self.rows.values()
    }

    pub fn get(&self, key: &RowKey) -> Option<&WideRow> {
        self.rows.get(key)
    }

    /// First non-null cell for this institution-year, in source order
    pub fn value(&self, institution_id: &str, year: i32, column: &str) -> Option<f64> {
        self.rows
            .range(RowKey::new(institution_id, year, "")..)
            .take_while(|(key, _)| key.institution_id == institution_id && key.year == year)
            .find_map(|(_, row)| row.value(column))
    }

    pub fn source_value(&self, source: &str, institution_id: &str, year: i32, column: &str) -> Option<f64> {
        self.get(&RowKey::new(institution_id, year, source))
            .and_then(|row| row.value(column))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Add percentage columns.
    ///
    /// A row is kept only if at least one spec has a non-null, non-zero
    /// denominator in it. Within a kept row a percentage cell is null when its
    /// own denominator is null or zero, or its numerator is null.
    pub fn with_percentages(&self, specs: &[PercentageSpec], decimals: u32) -> WideTable {
        if specs.is_empty() {
            return self.clone();
        }

        let mut out = WideTable::new(self.columns.clone());
        for spec in specs {
            out.add_column(&spec.column_name());
        }

        for row in self.rows.values() {
            let mut usable = false;
            let mut percentages = BTreeMap::new();
            for spec in specs {
                let denominator = match row.value(&spec.denominator) {
                    Some(d) if d != 0.0 => d,
                    _ => continue,
                };
                usable = true;
                if let Some(numerator) = row.value(&spec.numerator) {
                    percentages.insert(
                        spec.column_name(),
                        round_to(numerator / denominator * 100.0, decimals),
                    );
                }
            }
            if usable {
                let mut kept = row.clone();
                kept.values.extend(percentages);
                out.rows.insert(kept.key(), kept);
            }
        }

        out
    }
}

/// `numerator / denominator * 100`, written to `<numerator>_pc_<denominator_short>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageSpec {
    pub numerator: String,
    pub denominator: String,
    pub denominator_short: String,
}

impl PercentageSpec {
    /// `denominator_short` defaults to the full denominator name
    pub fn new(
        numerator: &str,
        denominator: &str,
        denominator_short: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPercentage {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            reason: reason.to_string(),
        };

        if numerator.trim().is_empty() || denominator.trim().is_empty() {
            return Err(invalid("column names must not be empty"));
        }
        if numerator == denominator {
            return Err(invalid("numerator and denominator are the same column"));
        }
        let short = denominator_short.unwrap_or(denominator);
        if short.trim().is_empty() {
            return Err(invalid("denominator short name must not be empty"));
        }

        Ok(Self {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            denominator_short: short.to_string(),
        })
    }

    pub fn column_name(&self) -> String {
        format!("{}_pc_{}", self.numerator, self.denominator_short)
    }

    /// Share of total academic staff for every sub-population metric
    pub fn defaults() -> Vec<PercentageSpec> {
        [
            ACADEMIC_WOMEN_COUNT,
            ACADEMIC_INDIGENOUS_COUNT,
            ACADEMIC_WHITE_COUNT,
            ACADEMIC_INDIGENOUS_WOMEN_COUNT,
        ]
        .iter()
        .map(|numerator| PercentageSpec {
            numerator: numerator.to_string(),
            denominator: ACADEMIC_TOTAL_COUNT.to_string(),
            denominator_short: TOTAL_ACADEMIC_SHORT.to_string(),
        })
        .collect()
    }
}

/// Round half away from zero to `decimals` places, at most [`MAX_DECIMALS`]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    (value * factor).round() / factor
}
