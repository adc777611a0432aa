/// Source identifiers used across filters, file names and id maps.
pub const UK_HESA: &str = "uk_hesa";
pub const US_IPEDS: &str = "us_ipeds";
pub const NZ_MOE: &str = "nz_moe";
pub const AU_DET: &str = "au_det";
pub const SA_HEMIS: &str = "sa_hemis";

// Metric names (output column names)
pub const ACADEMIC_TOTAL_COUNT: &str = "academic_total_count";
pub const ACADEMIC_WOMEN_COUNT: &str = "academic_women_count";
pub const ACADEMIC_INDIGENOUS_COUNT: &str = "academic_indigenous_count";
pub const ACADEMIC_INDIGENOUS_WOMEN_COUNT: &str = "academic_indigenous_women_count";
pub const ACADEMIC_WHITE_COUNT: &str = "academic_white_count";

/// Every source must be able to produce these two metrics.
pub const MANDATORY_METRICS: [&str; 2] = [ACADEMIC_TOTAL_COUNT, ACADEMIC_WOMEN_COUNT];

/// Short name of `academic_total_count` used in percentage column names.
pub const TOTAL_ACADEMIC_SHORT: &str = "totac";

pub const DEFAULT_DECIMALS: u32 = 2;
/// Beyond this an f64 percentage has no more significant digits to round.
pub const MAX_DECIMALS: u32 = 10;

// Key columns of the wide output table
pub const COL_INSTITUTION_ID: &str = "institution_id";
pub const COL_INSTITUTION_NAME: &str = "institution_name";
pub const COL_SOURCE: &str = "source";
pub const COL_YEAR: &str = "year";

/// Separator for category axes/values inside a single CSV cell.
pub const CATEGORY_SEPARATOR: char = '|';

/// Get all supported source identifiers
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![UK_HESA, US_IPEDS, NZ_MOE, AU_DET, SA_HEMIS]
}

/// Prefix of the identifier-map file for a source, e.g. `uk` for `uk_hesa`.
pub fn id_map_prefix(source: &str) -> &str {
    source.get(0..2).unwrap_or(source)
}
