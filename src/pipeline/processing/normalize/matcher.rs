use crate::types::ObservationRow;

use super::metric::MetricDefinition;
use super::predicate::CategoryPredicate;

/// OR across a set of predicates. Overlapping predicates are not detected;
/// a row matching several still counts once.
#[derive(Debug, Clone)]
pub struct RowMatcher<'a> {
    predicates: Vec<&'a CategoryPredicate>,
}

impl<'a> RowMatcher<'a> {
    pub fn new(predicates: Vec<&'a CategoryPredicate>) -> Self {
        Self { predicates }
    }

    pub fn for_metric(definition: &'a MetricDefinition) -> Self {
        Self::new(definition.predicates().iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn matches(&self, row: &ObservationRow) -> bool {
        self.predicates.iter().any(|p| p.matches(row))
    }

    pub fn filter<'r>(
        &'r self,
        rows: &'r [ObservationRow],
    ) -> impl Iterator<Item = &'r ObservationRow> + 'r {
        rows.iter().filter(move |row| self.matches(row))
    }
}
