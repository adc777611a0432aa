use crate::constants::{ACADEMIC_TOTAL_COUNT, ACADEMIC_WOMEN_COUNT, AU_DET};
use crate::error::ConfigError;
use crate::pipeline::processing::normalize::metric::MetricDefinition;
use crate::pipeline::processing::normalize::predicate::{CategoryPredicate, PredicateBuilder, YearSpan};

const ACADEMIC_LEVELS: [&str; 4] = [
    "Above Senior Lecturer",
    "Senior lecturer (Level C)",
    "Lecturer (Level B)",
    "Below lecturer (Level A)",
];

fn academic() -> PredicateBuilder {
    CategoryPredicate::builder(AU_DET, YearSpan::range(2000, 2021))
        .require("current_duties_classification", ACADEMIC_LEVELS)
}

pub fn metric_definitions() -> Result<Vec<MetricDefinition>, ConfigError> {
    Ok(vec![
        MetricDefinition::new(ACADEMIC_TOTAL_COUNT, vec![academic().build()?])?,
        MetricDefinition::new(
            ACADEMIC_WOMEN_COUNT,
            vec![academic().require("gender", ["Female"]).build()?],
        )?,
    ])
}
