use crate::error::ConfigError;

use super::predicate::CategoryPredicate;

/// A named group of predicates producing one output column.
///
/// Each predicate usually covers one era of a source's spreadsheet layout;
/// together they span the source's full history for this metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    name: String,
    source: String,
    predicates: Vec<CategoryPredicate>,
}

impl MetricDefinition {
    /// Fails on an empty name, an empty predicate list or predicates from more than one source.
    pub fn new(
        name: impl Into<String>,
        predicates: Vec<CategoryPredicate>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyMetricName);
        }

        let source = match predicates.first() {
            Some(first) => first.source().to_string(),
            None => return Err(ConfigError::NoPredicates { metric: name }),
        };

        if let Some(stray) = predicates.iter().find(|p| p.source() != source) {
            return Err(ConfigError::MixedSources {
                metric: name,
                expected: source,
                found: stray.source().to_string(),
            });
        }

        Ok(Self {
            name,
            source,
            predicates,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn predicates(&self) -> &[CategoryPredicate] {
        &self.predicates
    }

    pub fn catch_all_predicates(&self) -> impl Iterator<Item = &CategoryPredicate> {
        self.predicates.iter().filter(|p| p.is_catch_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::predicate::YearSpan;

    fn predicate(source: &str) -> CategoryPredicate {
        CategoryPredicate::builder(source, YearSpan::range(2015, 2021))
            .require("sex", ["Female"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_definition_takes_source_from_predicates() {
        let def = MetricDefinition::new("academic_women_count", vec![predicate("uk_hesa")]).unwrap();
        assert_eq!(def.source(), "uk_hesa");
        assert_eq!(def.name(), "academic_women_count");
        assert_eq!(def.predicates().len(), 1);
    }

    #[test]
    fn test_mixed_sources_rejected_at_construction() {
        let err = MetricDefinition::new(
            "academic_women_count",
            vec![predicate("uk_hesa"), predicate("au_det")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MixedSources {
                metric: "academic_women_count".to_string(),
                expected: "uk_hesa".to_string(),
                found: "au_det".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_predicates_rejected() {
        assert!(matches!(
            MetricDefinition::new("academic_total_count", vec![]),
            Err(ConfigError::NoPredicates { .. })
        ));
        assert_eq!(
            MetricDefinition::new(" ", vec![predicate("uk_hesa")]),
            Err(ConfigError::EmptyMetricName)
        );
    }
}
