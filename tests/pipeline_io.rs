use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use staff_diversity::app::{CombineUseCase, NormalizeUseCase};
use staff_diversity::config::Config;
use staff_diversity::infra::table_csv::read_wide_csv;
use staff_diversity::infra::{FileBatchSource, FileTableStore};
use staff_diversity::observability::NullSink;
use staff_diversity::pipeline::ingestion::FileFormat;
use staff_diversity::pipeline::processing::normalize::{GroupBy, Normaliser};
use staff_diversity::pipeline::processing::MetricPipeline;

const CONFIG: &str = r#"
    [[sources.uk_hesa.metrics]]
    name = "academic_total_count"
    [[sources.uk_hesa.metrics.predicates]]
    years = { start = 2015, end = 2021 }
    requirements = { contract_marker = "Academic" }

    [[sources.uk_hesa.metrics]]
    name = "academic_women_count"
    [[sources.uk_hesa.metrics.predicates]]
    years = { start = 2015, end = 2021 }
    requirements = { contract_marker = "Academic", sex = "Female" }
"#;

const HEADER: &str = "year,source,source_institution_id,source_institution_name,source_category_type,source_category_value,count_type,count\n";

fn write_input(dir: &Path) {
    std::fs::write(
        dir.join("uk_hesa_2016.csv"),
        format!(
            "{}\
             2015/16,uk_hesa,I1,Institution One,sex|contract_marker,Female|Academic,,10\n\
             2015/16,uk_hesa,I1,Institution One,sex|contract_marker,Male|Academic,,15\n\
             2015/16,uk_hesa,I2,Institution Two,sex|contract_marker,Male|Academic,,0\n\
             2015/16,uk_hesa,I3,Institution Three,sex|contract_marker,Female,,4\n\
             2015/16,uk_hesa,I3,Institution Three,sex|contract_marker,Female|Academic,,-1\n",
            HEADER
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn test_normalise_then_combine_on_disk() -> Result<()> {
    let data = tempdir()?;
    let input = data.path().join("extracted");
    let output = data.path().join("normalised");
    std::fs::create_dir_all(&input)?;
    write_input(&input);

    let config = Config::from_toml_str(CONFIG)?;
    let registry = config.build_registry()?;
    let use_case = NormalizeUseCase::new(
        Arc::new(registry),
        MetricPipeline::new(Normaliser::new(GroupBy::SourceId, Arc::new(NullSink))),
        Arc::new(FileBatchSource::new(&input, None)),
        Arc::new(FileTableStore::new(&output, FileFormat::Csv)),
    );

    let summary = use_case.run_all(false).await?;
    assert!(summary.failures.is_empty());
    let report = &summary.reports[0];
    assert_eq!(report.batch, "uk_hesa_2016");
    assert_eq!(report.rows_loaded, 5);
    // length mismatch and negative count
    assert_eq!(report.rows_rejected, 2);

    let normalised = read_wide_csv(&output.join("uk_hesa_2016.csv"))?;
    assert_eq!(normalised.value("I1", 2016, "academic_total_count"), Some(25.0));
    assert_eq!(normalised.value("I1", 2016, "academic_women_count"), Some(10.0));
    assert_eq!(normalised.value("I2", 2016, "academic_total_count"), Some(0.0));
    assert_eq!(normalised.value("I2", 2016, "academic_women_count"), None);

    let rerun = use_case.run_all(false).await?;
    assert!(rerun.reports[0].skipped);

    let combined_path = data.path().join("combined.csv");
    let (combined_store, name) = FileTableStore::for_file(&combined_path)?;
    let report = CombineUseCase::new(
        Arc::new(FileTableStore::new(&output, FileFormat::Csv)),
        Arc::new(combined_store),
        config.percentage_specs()?,
        config.run.decimals,
    )
    .run(&name)
    .await?;

    assert_eq!(report.rows_in, 2);
    // I2 has a zero denominator
    assert_eq!(report.rows_out, 1);
    let combined = read_wide_csv(&combined_path)?;
    assert_eq!(combined.value("I1", 2016, "academic_women_count_pc_totac"), Some(40.0));
    Ok(())
}
