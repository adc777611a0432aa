//! The normalisation engine: selects long-form rows with per-source,
//! per-era predicates and sums them into named metrics.

pub mod filters;
pub mod matcher;
pub mod metric;
pub mod predicate;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::observability::diagnostics::{DiagnosticEvent, DiagnosticsSink, TracingSink};
use crate::types::{CountType, ObservationRow};

pub use matcher::RowMatcher;
pub use metric::MetricDefinition;
pub use predicate::{CategoryPredicate, YearSpan};
pub use registry::MetricRegistry;

/// Which identifier partitions the aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// The id as it appears in the source data
    #[default]
    SourceId,
    /// The mapped global id; rows without one are dropped and counted
    GlobalId,
}

/// Aggregation key. All fields compare by exact equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub institution_id: String,
    pub year: i32,
    pub source: String,
    pub institution_name: String,
}

/// Sources, years and count types observed in a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProfile {
    pub sources: BTreeSet<String>,
    pub years: BTreeSet<i32>,
    pub count_types: BTreeSet<CountType>,
}

impl BatchProfile {
    pub fn from_rows(rows: &[ObservationRow]) -> Self {
        let mut profile = Self::default();
        for row in rows {
            if !profile.sources.contains(&row.source) {
                profile.sources.insert(row.source.clone());
            }
            profile.years.insert(row.year);
            if let Some(ct) = row.count_type {
                profile.count_types.insert(ct);
            }
        }
        profile
    }

    /// Whether a predicate could apply to anything in this batch
    pub fn admits(&self, predicate: &CategoryPredicate) -> bool {
        self.sources.contains(predicate.source())
            && predicate.years().intersects(&self.years)
            && predicate
                .count_type()
                .map_or(true, |ct| self.count_types.contains(&ct))
    }
}

/// Aggregated output of one metric over one batch.
///
/// `computable == false` means no predicate applied to the batch. Such a
/// table is empty and must be read as "not measured", never as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable {
    pub metric: String,
    pub computable: bool,
    pub rows: BTreeMap<GroupKey, f64>,
    pub relevant_predicates: usize,
    pub matched_rows: usize,
    pub unmapped_rows: usize,
}

impl MetricTable {
    fn not_computable(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            computable: false,
            rows: BTreeMap::new(),
            relevant_predicates: 0,
            matched_rows: 0,
            unmapped_rows: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, key: &GroupKey) -> Option<f64> {
        self.rows.get(key).copied()
    }
}

/// Stateless between calls; share one across threads freely.
#[derive(Clone)]
pub struct Normaliser {
    group_by: GroupBy,
    sink: Arc<dyn DiagnosticsSink>,
}

impl std::fmt::Debug for Normaliser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normaliser")
            .field("group_by", &self.group_by)
            .field("sink", &"<Arc<dyn DiagnosticsSink>>")
            .finish()
    }
}

impl Default for Normaliser {
    fn default() -> Self {
        Self::new(GroupBy::SourceId, Arc::new(TracingSink))
    }
}

impl Normaliser {
    pub fn new(group_by: GroupBy, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { group_by, sink }
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticsSink> {
        &self.sink
    }

    /// Predicates of `definition` that can apply to the batch described by `profile`
    pub fn relevant_predicates<'d>(
        &self,
        definition: &'d MetricDefinition,
        profile: &BatchProfile,
    ) -> Vec<&'d CategoryPredicate> {
        definition
            .predicates()
            .iter()
            .filter(|p| profile.admits(p))
            .collect()
    }

    pub fn normalise(&self, rows: &[ObservationRow], definition: &MetricDefinition) -> MetricTable {
        let profile = BatchProfile::from_rows(rows);
        let relevant = self.relevant_predicates(definition, &profile);

        if relevant.is_empty() {
            self.sink.emit(DiagnosticEvent::MetricNotComputable {
                metric: definition.name().to_string(),
                sources: profile.sources.iter().cloned().collect(),
                years: profile.years.iter().copied().collect(),
            });
            return MetricTable::not_computable(definition.name());
        }

        self.sink.emit(DiagnosticEvent::PredicatesSelected {
            metric: definition.name().to_string(),
            selected: relevant.len(),
            total: definition.predicates().len(),
        });

        let relevant_count = relevant.len();
        let matcher = RowMatcher::new(relevant);
        let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
        let mut matched_rows = 0;
        let mut unmapped_rows = 0;

        for row in matcher.filter(rows) {
            matched_rows += 1;
            let institution_id = match self.group_by {
                GroupBy::SourceId => row.institution_id.clone(),
                GroupBy::GlobalId => match &row.global_id {
                    Some(id) => id.clone(),
                    None => {
                        unmapped_rows += 1;
                        continue;
                    }
                },
            };
            let key = GroupKey {
                institution_id,
                year: row.year,
                source: row.source.clone(),
                institution_name: row.institution_name.clone(),
            };
            groups.entry(key).or_default().push(row.count);
        }

        if unmapped_rows > 0 {
            self.sink.emit(DiagnosticEvent::UnmappedRowsDropped {
                metric: definition.name().to_string(),
                rows: unmapped_rows,
            });
        }

        let rows = groups
            .into_iter()
            .map(|(key, counts)| (key, order_independent_sum(counts)))
            .collect();

        MetricTable {
            metric: definition.name().to_string(),
            computable: true,
            rows,
            relevant_predicates: relevant_count,
            matched_rows,
            unmapped_rows,
        }
    }
}

/// Counts are sorted before summing so the float total does not depend on row order.
fn order_independent_sum(mut counts: Vec<f64>) -> f64 {
    counts.sort_by(|a, b| a.total_cmp(b));
    counts.into_iter().sum()
}
