use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ConfigError;
use crate::types::{CountType, ObservationRow};

/// The years a predicate may be applied to.
///
/// `Range` is half-open (`start..end`), so `{ start = 2015, end = 2021 }`
/// covers 2015 through 2020.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearSpan {
    Range { start: i32, end: i32 },
    List(BTreeSet<i32>),
}

impl YearSpan {
    pub fn range(start: i32, end: i32) -> Self {
        YearSpan::Range { start, end }
    }

    pub fn list(years: impl IntoIterator<Item = i32>) -> Self {
        YearSpan::List(years.into_iter().collect())
    }

    pub fn contains(&self, year: i32) -> bool {
        match self {
            YearSpan::Range { start, end } => (*start..*end).contains(&year),
            YearSpan::List(years) => years.contains(&year),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            YearSpan::Range { start, end } => start >= end,
            YearSpan::List(years) => years.is_empty(),
        }
    }

    /// True when at least one of `years` falls inside this span
    pub fn intersects(&self, years: &BTreeSet<i32>) -> bool {
        match self {
            YearSpan::Range { start, end } => {
                !self.is_empty() && years.range(*start..*end).next().is_some()
            }
            YearSpan::List(own) => own.iter().any(|y| years.contains(y)),
        }
    }
}

impl fmt::Display for YearSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSpan::Range { start, end } => write!(f, "{}..{}", start, end),
            YearSpan::List(years) => {
                let joined: Vec<String> = years.iter().map(|y| y.to_string()).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}

/// One source + year-span + axis-constraint rule selecting rows for a metric.
///
/// Immutable once built; construction rejects an empty source, an empty year
/// span and axes with no allowed values. An empty requirement map is accepted
/// and makes the predicate a catch-all for its source and years.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPredicate {
    source: String,
    years: YearSpan,
    requirements: BTreeMap<String, BTreeSet<String>>,
    count_type: Option<CountType>,
}

impl CategoryPredicate {
    pub fn new(
        source: impl Into<String>,
        years: YearSpan,
        requirements: BTreeMap<String, BTreeSet<String>>,
        count_type: Option<CountType>,
    ) -> Result<Self, ConfigError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ConfigError::EmptySource);
        }
        if years.is_empty() {
            return Err(ConfigError::EmptyYears { source_id: source });
        }
        if let Some((axis, _)) = requirements.iter().find(|(_, allowed)| allowed.is_empty()) {
            return Err(ConfigError::EmptyAllowedValues {
                source_id: source,
                axis: axis.clone(),
            });
        }

        Ok(Self {
            source,
            years,
            requirements,
            count_type,
        })
    }

    pub fn builder(source: impl Into<String>, years: YearSpan) -> PredicateBuilder {
        PredicateBuilder {
            source: source.into(),
            years,
            requirements: BTreeMap::new(),
            count_type: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn years(&self) -> &YearSpan {
        &self.years
    }

    pub fn requirements(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.requirements
    }

    pub fn count_type(&self) -> Option<CountType> {
        self.count_type
    }

    /// Matches every row of its source and years
    pub fn is_catch_all(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, row: &ObservationRow) -> bool {
        row.source == self.source
            && self.years.contains(row.year)
            && self.count_type.map_or(true, |ct| row.count_type == Some(ct))
            && self.requirements_met(row)
    }

    /// Every required axis must find a position in the row carrying an allowed
    /// value. Axes missing from the row fail the check.
    fn requirements_met(&self, row: &ObservationRow) -> bool {
        self.requirements.iter().all(|(axis, allowed)| {
            row.categories()
                .any(|(name, value)| name == axis && allowed.contains(value))
        })
    }
}

impl fmt::Display for CategoryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} years:{}", self.source, self.years)?;
        if let Some(ct) = self.count_type {
            write!(f, " count_type:{}", ct)?;
        }
        let reqs: Vec<String> = self
            .requirements
            .iter()
            .map(|(axis, allowed)| {
                let values: Vec<&str> = allowed.iter().map(String::as_str).collect();
                format!("{}={:?}", axis, values)
            })
            .collect();
        write!(f, " requirements:{{{}}}", reqs.join(", "))
    }
}

pub struct PredicateBuilder {
    source: String,
    years: YearSpan,
    requirements: BTreeMap<String, BTreeSet<String>>,
    count_type: Option<CountType>,
}

impl PredicateBuilder {
    /// Require `axis` to take one of `values`. Repeating an axis widens its allowed set.
    pub fn require<I, S>(mut self, axis: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .entry(axis.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn count_type(mut self, count_type: CountType) -> Self {
        self.count_type = Some(count_type);
        self
    }

    pub fn build(self) -> Result<CategoryPredicate, ConfigError> {
        CategoryPredicate::new(self.source, self.years, self.requirements, self.count_type)
    }
}
