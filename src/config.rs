use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_DECIMALS, MAX_DECIMALS};
use crate::error::ConfigError;
use crate::pipeline::ingestion::FileFormat;
use crate::pipeline::processing::normalize::{
    CategoryPredicate, GroupBy, MetricDefinition, MetricRegistry, YearSpan,
};
use crate::pipeline::processing::PercentageSpec;
use crate::types::CountType;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub percentages: Vec<PercentageConfig>,
    /// Per-source metric definitions. Empty means use the built-in filter sets.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub id_map_dir: Option<PathBuf>,
    pub combined_path: PathBuf,
    pub decimals: u32,
    pub group_by: GroupBy,
    pub output_format: FileFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/extracted"),
            output_dir: PathBuf::from("data/normalised"),
            id_map_dir: None,
            combined_path: PathBuf::from("data/combined.csv"),
            decimals: DEFAULT_DECIMALS,
            group_by: GroupBy::SourceId,
            output_format: FileFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PercentageConfig {
    pub numerator: String,
    pub denominator: String,
    #[serde(default)]
    pub denominator_short: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default)]
    pub predicates: Vec<PredicateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredicateConfig {
    /// Must agree with the enclosing `[sources.<source>]` key when given
    #[serde(default)]
    pub source: Option<String>,
    pub years: YearSpan,
    #[serde(default)]
    pub requirements: BTreeMap<String, OneOrMany>,
    #[serde(default)]
    pub count_type: Option<CountType>,
}

/// `"Academic"` or `["Academic", "Both"]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_set(self) -> BTreeSet<String> {
        match self {
            OneOrMany::One(v) => BTreeSet::from([v]),
            OneOrMany::Many(vs) => vs.into_iter().collect(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        if config.run.decimals > MAX_DECIMALS {
            return Err(ConfigError::InvalidDecimals {
                decimals: config.run.decimals,
                max: MAX_DECIMALS,
            });
        }
        Ok(config)
    }

    /// Build and validate the metric registry. Fails on any invalid predicate,
    /// mixed sources or a source missing a mandatory metric.
    pub fn build_registry(&self) -> Result<MetricRegistry, ConfigError> {
        if self.sources.is_empty() {
            return MetricRegistry::builtin();
        }

        let mut registry = MetricRegistry::new();
        for (source, source_config) in &self.sources {
            for metric in &source_config.metrics {
                registry.register(metric.to_definition(source)?)?;
            }
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn percentage_specs(&self) -> Result<Vec<PercentageSpec>, ConfigError> {
        if self.percentages.is_empty() {
            return Ok(PercentageSpec::defaults());
        }
        self.percentages
            .iter()
            .map(|p| PercentageSpec::new(&p.numerator, &p.denominator, p.denominator_short.as_deref()))
            .collect()
    }
}

impl MetricConfig {
    fn to_definition(&self, source: &str) -> Result<MetricDefinition, ConfigError> {
        let predicates = self
            .predicates
            .iter()
            .map(|p| p.to_predicate(&self.name, source))
            .collect::<Result<Vec<_>, _>>()?;
        MetricDefinition::new(self.name.clone(), predicates)
    }
}

impl PredicateConfig {
    fn to_predicate(&self, metric: &str, source: &str) -> Result<CategoryPredicate, ConfigError> {
        if let Some(explicit) = &self.source {
            if explicit != source {
                return Err(ConfigError::MixedSources {
                    metric: metric.to_string(),
                    expected: source.to_string(),
                    found: explicit.clone(),
                });
            }
        }
        let requirements = self
            .requirements
            .iter()
            .map(|(axis, values)| (axis.clone(), values.clone().into_set()))
            .collect();
        CategoryPredicate::new(source, self.years.clone(), requirements, self.count_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ACADEMIC_TOTAL_COUNT, ACADEMIC_WOMEN_COUNT};

    const TWO_ERAS: &str = r#"
        [run]
        decimals = 1
        group_by = "global_id"
        output_format = "ndjson"

        [[percentages]]
        numerator = "academic_women_count"
        denominator = "academic_total_count"
        denominator_short = "totac"

        [[sources.uk_hesa.metrics]]
        name = "academic_total_count"
        [[sources.uk_hesa.metrics.predicates]]
        years = { start = 2015, end = 2021 }
        requirements = { contract_marker = "Academic" }

        [[sources.uk_hesa.metrics]]
        name = "academic_women_count"
        [[sources.uk_hesa.metrics.predicates]]
        years = [2013, 2014]
        requirements = { sex = ["Female", "female"] }
        [[sources.uk_hesa.metrics.predicates]]
        source = "uk_hesa"
        years = { start = 2015, end = 2021 }
        requirements = { sex = "Female", contract_marker = "Academic" }
    "#;

    #[test]
    fn test_parse_and_build_registry() {
        let config = Config::from_toml_str(TWO_ERAS).unwrap();
        assert_eq!(config.run.decimals, 1);
        assert_eq!(config.run.group_by, GroupBy::GlobalId);
        assert_eq!(config.run.output_format, FileFormat::Ndjson);

        let registry = config.build_registry().unwrap();
        let defs = registry.definitions_for("uk_hesa");
        assert_eq!(defs.len(), 2);
        let women = defs.iter().find(|d| d.name() == ACADEMIC_WOMEN_COUNT).unwrap();
        assert_eq!(women.predicates().len(), 2);
        assert!(women.predicates()[0].years().contains(2014));
        assert!(!women.predicates()[0].years().contains(2015));
        assert_eq!(women.predicates()[0].requirements()["sex"].len(), 2);
    }

    #[test]
    fn test_decimals_are_bounded() {
        let err = Config::from_toml_str("[run]\ndecimals = 4294967295").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidDecimals {
                decimals: u32::MAX,
                max: MAX_DECIMALS
            }
        );
        assert!(Config::from_toml_str("[run]\ndecimals = 10").is_ok());
    }

    #[test]
    fn test_empty_sources_fall_back_to_builtin() {
        let config = Config::from_toml_str("").unwrap();
        let registry = config.build_registry().unwrap();
        assert!(registry.contains_source("uk_hesa"));
        assert!(registry.contains_source("sa_hemis"));
        assert_eq!(config.percentage_specs().unwrap().len(), 4);
    }

    #[test]
    fn test_missing_mandatory_metric_is_fatal() {
        let toml = r#"
            [[sources.nz_moe.metrics]]
            name = "academic_total_count"
            [[sources.nz_moe.metrics.predicates]]
            years = { start = 2012, end = 2019 }
            count_type = "headcount"
        "#;
        let err = Config::from_toml_str(toml).unwrap().build_registry().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingMandatoryMetric {
                source_id: "nz_moe".to_string(),
                metric: ACADEMIC_WOMEN_COUNT.to_string()
            }
        );
    }

    #[test]
    fn test_explicit_source_must_match_table_key() {
        let toml = r#"
            [[sources.uk_hesa.metrics]]
            name = "academic_total_count"
            [[sources.uk_hesa.metrics.predicates]]
            source = "us_ipeds"
            years = [2016]
        "#;
        let err = Config::from_toml_str(toml).unwrap().build_registry().unwrap_err();
        assert!(matches!(err, ConfigError::MixedSources { metric, .. } if metric == ACADEMIC_TOTAL_COUNT));
    }

    #[test]
    fn test_metric_without_predicates_is_fatal() {
        let toml = r#"
            [[sources.uk_hesa.metrics]]
            name = "academic_total_count"
        "#;
        let err = Config::from_toml_str(toml).unwrap().build_registry().unwrap_err();
        assert!(matches!(err, ConfigError::NoPredicates { .. }));
    }

    #[test]
    fn test_invalid_percentage_is_fatal() {
        let toml = r#"
            [[percentages]]
            numerator = "academic_total_count"
            denominator = "academic_total_count"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(matches!(
            config.percentage_specs(),
            Err(ConfigError::InvalidPercentage { .. })
        ));
    }
}
