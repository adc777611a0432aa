use serde::{Deserialize, Serialize};

use crate::error::RowError;

/// How a count was measured by the originating agency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountType {
    Fte,
    Headcount,
    Unknown,
}

impl CountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountType::Fte => "fte",
            CountType::Headcount => "headcount",
            CountType::Unknown => "unknown",
        }
    }

    /// Parse the labels extractors emit. NZ MoE writes "number of staff" for headcounts.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fte" => Some(CountType::Fte),
            "headcount" | "number of staff" => Some(CountType::Headcount),
            "unknown" => Some(CountType::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for CountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One long-form observation: an institution, a year, one combination of
/// category values and a single count.
///
/// Categories are kept as two positionally aligned sequences rather than a map
/// because extractors do emit the same axis name more than once per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub institution_id: String,
    pub institution_name: String,
    pub source: String,
    pub year: i32,
    pub category_type: Vec<String>,
    pub category_value: Vec<String>,
    #[serde(default)]
    pub count_type: Option<CountType>,
    pub count: f64,
    /// Global institution identifier, filled in by the id mapping step
    #[serde(default)]
    pub global_id: Option<String>,
}

impl ObservationRow {
    /// Iterate `(axis, value)` pairs in row order. Duplicated axes are yielded once per position.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &str)> {
        self.category_type
            .iter()
            .zip(self.category_value.iter())
            .map(|(t, v)| (t.as_str(), v.as_str()))
    }

    /// Check the row-level invariants the engine relies on.
    pub fn validate(&self) -> Result<(), RowError> {
        if self.source.trim().is_empty() {
            return Err(RowError::MissingField("source"));
        }
        if self.institution_id.trim().is_empty() {
            return Err(RowError::MissingField("institution_id"));
        }
        if self.category_type.len() != self.category_value.len() {
            return Err(RowError::CategoryLengthMismatch {
                types: self.category_type.len(),
                values: self.category_value.len(),
            });
        }
        if !self.count.is_finite() {
            return Err(RowError::NonFiniteCount);
        }
        if self.count < 0.0 {
            return Err(RowError::NegativeCount(self.count));
        }
        Ok(())
    }
}
