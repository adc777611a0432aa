use crate::constants::{
    ACADEMIC_INDIGENOUS_COUNT, ACADEMIC_INDIGENOUS_WOMEN_COUNT, ACADEMIC_TOTAL_COUNT,
    ACADEMIC_WHITE_COUNT, ACADEMIC_WOMEN_COUNT, NZ_MOE,
};
use crate::error::ConfigError;
use crate::pipeline::processing::normalize::metric::MetricDefinition;
use crate::pipeline::processing::normalize::predicate::{CategoryPredicate, PredicateBuilder, YearSpan};
use crate::types::CountType;

const ALL_ETHNIC_GROUPS: [&str; 5] = ["european", "māori", "pacific peoples", "asian", "other"];
const INDIGENOUS_GROUPS: [&str; 2] = ["māori", "pacific peoples"];

/// MoE sheets publish both FTE and headcount; metrics use headcount.
fn headcount<'a>(ethnic_groups: impl IntoIterator<Item = &'a str>, gender: &str) -> PredicateBuilder {
    CategoryPredicate::builder(NZ_MOE, YearSpan::range(2012, 2019))
        .count_type(CountType::Headcount)
        .require("staff type/group", ["total"])
        .require("ethnic group", ethnic_groups)
        .require("gender", [gender])
}

pub fn metric_definitions() -> Result<Vec<MetricDefinition>, ConfigError> {
    Ok(vec![
        MetricDefinition::new(
            ACADEMIC_TOTAL_COUNT,
            vec![headcount(ALL_ETHNIC_GROUPS, "total").build()?],
        )?,
        MetricDefinition::new(
            ACADEMIC_WOMEN_COUNT,
            vec![headcount(ALL_ETHNIC_GROUPS, "females").build()?],
        )?,
        MetricDefinition::new(
            ACADEMIC_INDIGENOUS_COUNT,
            vec![headcount(INDIGENOUS_GROUPS, "total").build()?],
        )?,
        MetricDefinition::new(
            ACADEMIC_INDIGENOUS_WOMEN_COUNT,
            vec![headcount(INDIGENOUS_GROUPS, "females").build()?],
        )?,
        MetricDefinition::new(
            ACADEMIC_WHITE_COUNT,
            vec![headcount(["european"], "total").build()?],
        )?,
    ])
}
