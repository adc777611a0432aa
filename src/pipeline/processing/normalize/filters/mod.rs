//! Built-in filter sets, one module per agency.
//!
//! Every source must provide at least `academic_total_count` (which may
//! really be FTE) and `academic_women_count`. Each era of an agency's
//! spreadsheet layout gets its own predicate; all eras of a metric are
//! grouped under one definition.

pub mod au_det;
pub mod nz_moe;
pub mod sa_hemis;
pub mod uk_hesa;
pub mod us_ipeds;

use crate::error::ConfigError;

use super::metric::MetricDefinition;

pub fn builtin_definitions() -> Result<Vec<MetricDefinition>, ConfigError> {
    let mut definitions = Vec::new();
    definitions.extend(uk_hesa::metric_definitions()?);
    definitions.extend(us_ipeds::metric_definitions()?);
    definitions.extend(nz_moe::metric_definitions()?);
    definitions.extend(au_det::metric_definitions()?);
    definitions.extend(sa_hemis::metric_definitions()?);
    Ok(definitions)
}
