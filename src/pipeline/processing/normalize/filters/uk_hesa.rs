use crate::constants::{ACADEMIC_TOTAL_COUNT, ACADEMIC_WOMEN_COUNT, UK_HESA};
use crate::error::ConfigError;
use crate::pipeline::processing::normalize::metric::MetricDefinition;
use crate::pipeline::processing::normalize::predicate::{CategoryPredicate, PredicateBuilder, YearSpan};

// 2009-2014 files are split by atypical marker and use lower-case values
const ACADEMIC_ATYPICAL: [&str; 2] = ["academic excl atypical", "academic atypical"];

fn current_era() -> PredicateBuilder {
    CategoryPredicate::builder(UK_HESA, YearSpan::range(2015, 2021))
        .require("contract_levels", ["All"])
        .require("terms_of_employment", ["All"])
        .require("contract_marker", ["Academic"])
}

fn atypical_era(start: i32, end: i32) -> PredicateBuilder {
    CategoryPredicate::builder(UK_HESA, YearSpan::range(start, end))
        .require("atypical_marker", ACADEMIC_ATYPICAL)
}

pub fn metric_definitions() -> Result<Vec<MetricDefinition>, ConfigError> {
    let total = MetricDefinition::new(
        ACADEMIC_TOTAL_COUNT,
        vec![
            current_era().require("total", ["Total"]).build()?,
            atypical_era(2013, 2015).require("sex", ["female", "male"]).build()?,
            atypical_era(2009, 2013).require("gender", ["female", "male"]).build()?,
        ],
    )?;

    let women = MetricDefinition::new(
        ACADEMIC_WOMEN_COUNT,
        vec![
            current_era().require("sex", ["Female"]).build()?,
            atypical_era(2013, 2015).require("sex", ["female"]).build()?,
            atypical_era(2009, 2013).require("gender", ["female"]).build()?,
        ],
    )?;

    Ok(vec![total, women])
}
