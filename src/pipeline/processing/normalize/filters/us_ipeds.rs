use crate::constants::{
    ACADEMIC_INDIGENOUS_COUNT, ACADEMIC_INDIGENOUS_WOMEN_COUNT, ACADEMIC_TOTAL_COUNT,
    ACADEMIC_WHITE_COUNT, ACADEMIC_WOMEN_COUNT, US_IPEDS,
};
use crate::error::ConfigError;
use crate::pipeline::processing::normalize::metric::MetricDefinition;
use crate::pipeline::processing::normalize::predicate::{CategoryPredicate, PredicateBuilder, YearSpan};

const OCCUPATION_2015: [&str; 3] = ["instruction", "research", "public service"];
const OCCUPATION_2011: [&str; 2] = ["instructional staff", "service"];
const OCCUPATION_2008: &str = "full time and part time, instruction/research/public service";
const OCCUPATION_2001: &str =
    "full time and part time, faculty (instruction/research/public service)";

/// 2015 onwards: separate gender and ethnicity axes
fn era_2015(gender: &str) -> PredicateBuilder {
    CategoryPredicate::builder(US_IPEDS, YearSpan::range(2015, 2020))
        .require("occupation_filled", OCCUPATION_2015)
        .require("gender", [gender])
}

/// Before 2015 gender and ethnicity share one combined axis
fn combined_era(span: YearSpan, occupation: &[&str]) -> PredicateBuilder {
    CategoryPredicate::builder(US_IPEDS, span)
        .require("occupation_and_status", occupation.iter().copied())
}

fn era_2011() -> PredicateBuilder {
    combined_era(YearSpan::range(2011, 2015), &OCCUPATION_2011)
}

fn era_2008(span: YearSpan) -> PredicateBuilder {
    combined_era(span, &[OCCUPATION_2008])
}

fn era_2001(span: YearSpan) -> PredicateBuilder {
    combined_era(span, &[OCCUPATION_2001])
}

pub fn metric_definitions() -> Result<Vec<MetricDefinition>, ConfigError> {
    let total = MetricDefinition::new(
        ACADEMIC_TOTAL_COUNT,
        vec![
            era_2015("total").require("ethnicity", ["total"]).build()?,
            era_2011().require("gender_and_ethnicity", ["grand_total"]).build()?,
            era_2008(YearSpan::range(2008, 2011))
                .require("gender_and_ethnicity", ["grand_total"])
                .build()?,
            era_2001(YearSpan::range(2001, 2008))
                .require("gender_and_ethnicity", ["grand_total"])
                .build()?,
        ],
    )?;

    let women = MetricDefinition::new(
        ACADEMIC_WOMEN_COUNT,
        vec![
            era_2015("women").require("ethnicity", ["total"]).build()?,
            era_2011().require("gender_and_ethnicity", ["grand_total_women"]).build()?,
            era_2008(YearSpan::range(2008, 2011))
                .require("gender_and_ethnicity", ["grand_total_women"])
                .build()?,
            era_2001(YearSpan::range(2001, 2008))
                .require("gender_and_ethnicity", ["grand_total_women"])
                .build()?,
        ],
    )?;

    let indigenous = MetricDefinition::new(
        ACADEMIC_INDIGENOUS_COUNT,
        vec![
            era_2015("total")
                .require(
                    "ethnicity",
                    ["american_indian_or_alaska_native", "native_hawaiian_or_other_pacific_islander"],
                )
                .build()?,
            era_2011()
                .require(
                    "gender_and_ethnicity",
                    [
                        "american_indian_or_alaska_native_total",
                        "native_hawaiian_or_other_pacific_islander_total",
                    ],
                )
                .build()?,
            era_2008(YearSpan::range(2010, 2011))
                .require(
                    "gender_and_ethnicity",
                    [
                        "american_indian_or_alaska_native_total",
                        "native_hawaiian_or_other_pacific_islander_total",
                    ],
                )
                .build()?,
            era_2008(YearSpan::range(2008, 2010))
                .require(
                    "gender_and_ethnicity",
                    [
                        "american_indian_or_alaska_native_total_-_new",
                        "native_hawaiian_or_other_pacific_islander_total_-_new",
                    ],
                )
                .build()?,
            era_2001(YearSpan::range(2001, 2008))
                .require("gender_and_ethnicity", ["american_indian_or_alaska_native_total"])
                .build()?,
        ],
    )?;

    let indigenous_women = MetricDefinition::new(
        ACADEMIC_INDIGENOUS_WOMEN_COUNT,
        vec![
            era_2015("women")
                .require(
                    "ethnicity",
                    ["american_indian_or_alaska_native", "native_hawaiian_or_other_pacific_islander"],
                )
                .build()?,
            era_2011()
                .require(
                    "gender_and_ethnicity",
                    [
                        "american_indian_or_alaska_native_women",
                        "native_hawaiian_or_other_pacific_islander_women",
                    ],
                )
                .build()?,
            era_2008(YearSpan::range(2010, 2011))
                .require(
                    "gender_and_ethnicity",
                    [
                        "american_indian_or_alaska_native_women",
                        "native_hawaiian_or_other_pacific_islander_women",
                    ],
                )
                .build()?,
            era_2008(YearSpan::range(2008, 2010))
                .require(
                    "gender_and_ethnicity",
                    [
                        "american_indian_or_alaska_native_women_-_new",
                        "native_hawaiian_or_other_pacific_islander_women_-_new",
                    ],
                )
                .build()?,
            era_2001(YearSpan::range(2001, 2008))
                .require("gender_and_ethnicity", ["american_indian_or_alaska_native_women"])
                .build()?,
        ],
    )?;

    // 2003 spells the white category with an extra comma
    let white = MetricDefinition::new(
        ACADEMIC_WHITE_COUNT,
        vec![
            era_2015("total").require("ethnicity", ["white"]).build()?,
            era_2011().require("gender_and_ethnicity", ["white_total"]).build()?,
            era_2008(YearSpan::range(2010, 2011))
                .require("gender_and_ethnicity", ["white_total"])
                .build()?,
            era_2008(YearSpan::range(2008, 2010))
                .require("gender_and_ethnicity", ["white_total_-_new"])
                .build()?,
            era_2001(YearSpan::list([2001, 2002, 2004, 2005, 2006, 2007]))
                .require("gender_and_ethnicity", ["white_non-hispanic_total"])
                .build()?,
            era_2001(YearSpan::list([2003]))
                .require("gender_and_ethnicity", ["white,_non-hispanic_total"])
                .build()?,
        ],
    )?;

    Ok(vec![total, women, indigenous, indigenous_women, white])
}
