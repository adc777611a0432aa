use thiserror::Error;

/// Static configuration mistakes. Raised while loading or constructing
/// predicates and metric definitions, never during evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Predicate has an empty source")]
    EmptySource,

    #[error("Predicate for source '{source_id}' covers no years")]
    EmptyYears { source_id: String },

    #[error("Predicate for source '{source_id}' allows no values for axis '{axis}'")]
    EmptyAllowedValues { source_id: String, axis: String },

    #[error("Metric definition has an empty name")]
    EmptyMetricName,

    #[error("Metric '{metric}' has no predicates")]
    NoPredicates { metric: String },

    #[error("Metric '{metric}' mixes sources '{expected}' and '{found}'")]
    MixedSources {
        metric: String,
        expected: String,
        found: String,
    },

    #[error("Metric '{metric}' is defined twice for source '{source_id}'")]
    DuplicateMetric { source_id: String, metric: String },

    #[error("Source '{source_id}' does not define mandatory metric '{metric}'")]
    MissingMandatoryMetric { source_id: String, metric: String },

    #[error("Percentage spec '{numerator}' / '{denominator}' is invalid: {reason}")]
    InvalidPercentage {
        numerator: String,
        denominator: String,
        reason: String,
    },

    #[error("decimals = {decimals} is out of range (at most {max})")]
    InvalidDecimals { decimals: u32, max: u32 },

    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("TOML deserialization failed: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e.to_string())
    }
}

/// Defects local to a single observation row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("category_type has {types} entries but category_value has {values}")]
    CategoryLengthMismatch { types: usize, values: usize },

    #[error("count {0} is negative")]
    NegativeCount(f64),

    #[error("count is not a finite number")]
    NonFiniteCount,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unparseable record: {0}")]
    Unparseable(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum YearError {
    #[error("year value is empty")]
    Empty,

    #[error("cannot resolve year from '{0}'")]
    Unrecognised(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Row error: {0}")]
    Row(#[from] RowError),

    #[error("Year error: {0}")]
    Year(#[from] YearError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
