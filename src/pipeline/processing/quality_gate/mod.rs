use serde::Serialize;

use crate::error::RowError;
use crate::types::ObservationRow;

/// Quality Gate decision for a single row
#[derive(Debug, Clone, PartialEq)]
pub enum QualityDecision {
    /// Row is structurally sound and enters the engine
    Accept,
    /// Row is left out of the batch and counted
    Reject(RowError),
}

/// A row left out of its batch, with enough context to find it again
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    pub source: String,
    pub institution_id: String,
    pub year: i32,
    pub reason: String,
}

/// Rows that passed the gate plus a record of those that did not
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub accepted: Vec<ObservationRow>,
    pub rejections: Vec<RowRejection>,
}

impl ValidatedBatch {
    pub fn rejected_count(&self) -> usize {
        self.rejections.len()
    }
}

/// Trait for implementing row-level assessment logic
pub trait QualityGate {
    fn assess(&self, row: &ObservationRow) -> QualityDecision;

    /// Split a batch into accepted rows and rejections. One bad row never voids the batch.
    fn partition(&self, rows: Vec<ObservationRow>) -> ValidatedBatch {
        let mut batch = ValidatedBatch::default();
        for row in rows {
            match self.assess(&row) {
                QualityDecision::Accept => batch.accepted.push(row),
                QualityDecision::Reject(reason) => batch.rejections.push(RowRejection {
                    source: row.source,
                    institution_id: row.institution_id,
                    year: row.year,
                    reason: reason.to_string(),
                }),
            }
        }
        batch
    }
}

/// Configuration for Quality Gate assessment rules
#[derive(Debug, Clone, Default)]
pub struct QualityGateConfig {
    /// When set, rows from any other source are rejected
    pub expected_source: Option<String>,
}

/// Checks the structural invariants of [`ObservationRow`]; does not judge the
/// plausibility of the data itself.
#[derive(Debug, Clone, Default)]
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    pub fn for_source(source: &str) -> Self {
        Self::with_config(QualityGateConfig {
            expected_source: Some(source.to_string()),
        })
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess(&self, row: &ObservationRow) -> QualityDecision {
        if let Err(e) = row.validate() {
            return QualityDecision::Reject(e);
        }
        if let Some(expected) = &self.config.expected_source {
            if &row.source != expected {
                return QualityDecision::Reject(RowError::Unparseable(format!(
                    "row from source '{}' in a '{}' batch",
                    row.source, expected
                )));
            }
        }
        QualityDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(count: f64) -> ObservationRow {
        ObservationRow {
            institution_id: "I1".to_string(),
            institution_name: "Institution One".to_string(),
            source: "uk_hesa".to_string(),
            year: 2016,
            category_type: vec!["sex".to_string()],
            category_value: vec!["Female".to_string()],
            count_type: None,
            count,
            global_id: None,
        }
    }

    #[test]
    fn test_partition_rejects_and_counts() {
        let mut mismatched = row(3.0);
        mismatched.category_type.push("contract_marker".to_string());
        let rows = vec![row(1.0), mismatched, row(-2.0), row(4.0)];

        let batch = DefaultQualityGate::new().partition(rows);

        assert_eq!(batch.accepted.len(), 2);
        assert_eq!(batch.rejected_count(), 2);
        assert!(batch.rejections[0].reason.contains("category_type has 2 entries"));
    }

    #[test]
    fn test_source_restricted_gate() {
        let gate = DefaultQualityGate::for_source("au_det");
        assert!(matches!(gate.assess(&row(1.0)), QualityDecision::Reject(_)));
        assert_eq!(DefaultQualityGate::for_source("uk_hesa").assess(&row(1.0)), QualityDecision::Accept);
    }
}
