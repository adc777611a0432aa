use crate::constants::{ACADEMIC_TOTAL_COUNT, ACADEMIC_WHITE_COUNT, ACADEMIC_WOMEN_COUNT, SA_HEMIS};
use crate::error::ConfigError;
use crate::pipeline::processing::normalize::metric::MetricDefinition;
use crate::pipeline::processing::normalize::predicate::{CategoryPredicate, PredicateBuilder, YearSpan};

fn instruction_research() -> PredicateBuilder {
    CategoryPredicate::builder(SA_HEMIS, YearSpan::range(2001, 2020))
        .require("personnel_category", ["1.1 instruction/research professional"])
}

pub fn metric_definitions() -> Result<Vec<MetricDefinition>, ConfigError> {
    Ok(vec![
        MetricDefinition::new(
            ACADEMIC_TOTAL_COUNT,
            vec![instruction_research().require("race", ["total"]).build()?],
        )?,
        MetricDefinition::new(
            ACADEMIC_WOMEN_COUNT,
            vec![instruction_research().require("gender", ["female"]).build()?],
        )?,
        MetricDefinition::new(
            ACADEMIC_WHITE_COUNT,
            vec![instruction_research().require("race", ["white"]).build()?],
        )?,
    ])
}
