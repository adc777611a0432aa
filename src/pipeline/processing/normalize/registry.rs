use std::collections::BTreeMap;

use crate::constants::MANDATORY_METRICS;
use crate::error::ConfigError;

use super::filters;
use super::metric::MetricDefinition;

/// Metric definitions per source, built once at startup and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    sources: BTreeMap<String, Vec<MetricDefinition>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The filter sets shipped with the crate for the five supported agencies
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for definition in filters::builtin_definitions()? {
            registry.register(definition)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Register a definition under its own source. Names must be unique per source.
    pub fn register(&mut self, definition: MetricDefinition) -> Result<(), ConfigError> {
        let definitions = self
            .sources
            .entry(definition.source().to_string())
            .or_default();

        if definitions.iter().any(|d| d.name() == definition.name()) {
            return Err(ConfigError::DuplicateMetric {
                source_id: definition.source().to_string(),
                metric: definition.name().to_string(),
            });
        }

        definitions.push(definition);
        Ok(())
    }

    /// Every registered source must define the mandatory metrics
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (source, definitions) in &self.sources {
            for mandatory in MANDATORY_METRICS {
                if !definitions.iter().any(|d| d.name() == mandatory) {
                    return Err(ConfigError::MissingMandatoryMetric {
                        source_id: source.clone(),
                        metric: mandatory.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Definitions for a source, in registration order. Unknown sources yield an empty slice.
    pub fn definitions_for(&self, source: &str) -> &[MetricDefinition] {
        self.sources
            .get(source)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    pub fn list_sources(&self) -> Vec<&str> {
        self.sources.keys().map(|k| k.as_str()).collect()
    }

    /// Every metric name across all sources, first-seen order
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for definition in self.sources.values().flatten() {
            if !names.iter().any(|n| n == definition.name()) {
                names.push(definition.name().to_string());
            }
        }
        names
    }

    /// `(metric, source)` for every predicate with no requirements
    pub fn catch_all_predicates(&self) -> Vec<(String, String)> {
        self.sources
            .values()
            .flatten()
            .flat_map(|d| {
                d.catch_all_predicates()
                    .map(move |p| (d.name().to_string(), p.source().to_string()))
            })
            .collect()
    }
}
