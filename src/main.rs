use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use staff_diversity::app::{CombineUseCase, NormalizeUseCase, RunSummary};
use staff_diversity::config::{Config, DEFAULT_CONFIG_PATH};
use staff_diversity::infra::{FileBatchSource, FileTableStore};
use staff_diversity::logging;
use staff_diversity::observability::{self, DiagnosticEvent, DiagnosticsSink, TracingSink};
use staff_diversity::pipeline::ingestion::IdMap;
use staff_diversity::pipeline::processing::normalize::{MetricRegistry, Normaliser};
use staff_diversity::pipeline::processing::MetricPipeline;

#[derive(Parser)]
#[command(name = "staff_diversity")]
#[command(about = "Normalise higher-education staff statistics into comparable diversity metrics")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalise extracted long-form files into one wide table per batch
    Normalise {
        /// Sources to process (comma-separated), default all configured
        #[arg(long)]
        sources: Option<String>,
        /// Reprocess batches whose output already exists
        #[arg(long)]
        force: bool,
    },
    /// Merge normalised tables and add percentage columns
    Combine,
    /// Normalise then combine
    Run {
        #[arg(long)]
        sources: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the configuration, then print the metric registry
    CheckConfig,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("Invalid configuration {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(Path::new(DEFAULT_CONFIG_PATH)).context("Invalid configuration config.toml")
        }
        None => {
            warn!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
            Ok(Config::default())
        }
    }
}

fn select_sources(registry: &MetricRegistry, requested: Option<&str>) -> Result<BTreeSet<String>> {
    let Some(list) = requested else {
        return Ok(registry.list_sources().into_iter().map(str::to_string).collect());
    };
    let mut selected = BTreeSet::new();
    for source in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !registry.contains_source(source) {
            bail!(
                "Unknown source '{}'. Configured: {}",
                source,
                registry.list_sources().join(", ")
            );
        }
        selected.insert(source.to_string());
    }
    Ok(selected)
}

fn load_id_maps(dir: Option<&Path>, sources: &BTreeSet<String>) -> Result<BTreeMap<String, IdMap>> {
    let mut maps = BTreeMap::new();
    let Some(dir) = dir else {
        return Ok(maps);
    };
    for source in sources {
        if let Some(map) = IdMap::load_for_source(dir, source)
            .with_context(|| format!("Failed to load identifier map for {}", source))?
        {
            maps.insert(source.clone(), map);
        }
    }
    Ok(maps)
}

async fn run_normalise(config: &Config, requested: Option<&str>, force: bool) -> Result<RunSummary> {
    let registry = config.build_registry()?;
    let sources = select_sources(&registry, requested)?;
    let id_maps = load_id_maps(config.run.id_map_dir.as_deref(), &sources)?;

    let normaliser = Normaliser::new(config.run.group_by, Arc::new(TracingSink));
    let use_case = NormalizeUseCase::new(
        Arc::new(registry),
        MetricPipeline::new(normaliser),
        Arc::new(FileBatchSource::new(&config.run.input_dir, Some(sources))),
        Arc::new(FileTableStore::new(&config.run.output_dir, config.run.output_format)),
    )
    .with_id_maps(id_maps);

    let summary = use_case.run_all(force).await?;

    println!("\n📊 Normalisation results (run {}):", use_case.run_id());
    for report in &summary.reports {
        if report.skipped {
            println!("   {} skipped (output exists)", report.batch);
            continue;
        }
        println!(
            "   {}: {} rows, {} unparseable, {} rejected, {} unmapped, computed [{}], not computable [{}]",
            report.batch,
            report.rows_loaded,
            report.records_unparseable,
            report.rows_rejected,
            report.rows_unmapped(),
            report.computed_metrics().join(", "),
            report.not_computable_metrics().join(", "),
        );
    }
    for (batch, error) in &summary.failures {
        println!("   ❌ {}: {}", batch, error);
    }
    Ok(summary)
}

async fn run_combine(config: &Config) -> Result<()> {
    let specs = config.percentage_specs()?;
    let (output, name) = FileTableStore::for_file(&config.run.combined_path)?;
    let input = FileTableStore::new(&config.run.output_dir, config.run.output_format);

    let report = CombineUseCase::new(Arc::new(input), Arc::new(output), specs, config.run.decimals)
        .run(&name)
        .await?;

    println!("\n📊 Combined {} tables:", report.tables_merged);
    println!("   Rows in: {}", report.rows_in);
    println!("   Rows with a usable denominator: {}", report.rows_out);
    println!("   Output file: {}", report.output.display());
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    let registry = config.build_registry()?;
    let specs = config.percentage_specs()?;
    let sink = TracingSink;

    for (metric, source) in registry.catch_all_predicates() {
        sink.emit(DiagnosticEvent::CatchAllPredicate { metric, source });
    }

    println!("✅ Configuration is valid");
    for source in registry.list_sources() {
        println!("   {}:", source);
        for definition in registry.definitions_for(source) {
            println!("      {} ({} predicates)", definition.name(), definition.predicates().len());
        }
    }
    for spec in &specs {
        println!("   percentage {} = {} / {}", spec.column_name(), spec.numerator, spec.denominator);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    observability::init_metrics();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalise { sources, force } => {
            let summary = run_normalise(&config, sources.as_deref(), force).await?;
            if !summary.failures.is_empty() {
                bail!("{} batch(es) failed", summary.failures.len());
            }
        }
        Commands::Combine => run_combine(&config).await?,
        Commands::Run { sources, force } => {
            let summary = run_normalise(&config, sources.as_deref(), force).await?;
            if !summary.failures.is_empty() {
                bail!("{} batch(es) failed, not combining", summary.failures.len());
            }
            run_combine(&config).await?;
        }
        Commands::CheckConfig => check_config(&config)?,
    }

    info!("Done");
    Ok(())
}
