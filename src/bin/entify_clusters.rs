//! Entify command-line driver.
//!
//! Reads a JSON array of match records, clusters them and prints the
//! result as the flat CSV export, as cluster JSON, or as statistics.
//!
//! Usage:
//!    entify-clusters --input matches.json --threshold 0.8 --min-size 2
//!    entify-clusters --input matches.json --records people.csv --format json

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use tracing::{info, warn};

use entify::logging::{init_logging, DEFAULT_FILTER};
use entify::{
    resolve, write_csv, ClusterSet, InMemoryRecordStore, RecordEnricher, ResolutionConfig,
    SizeRange,
};

const DEFAULT_TABLE: &str = "input_data";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// entity_id,cluster_id,cluster_number,cluster_size rows
    Csv,
    /// Full clusters with entities and edges
    Json,
    /// Cluster statistics and rejection counts
    Stats,
}

#[derive(Parser, Debug)]
#[clap(name = "entify-clusters", about = "Cluster pairwise match scores into entities")]
struct Cli {
    /// JSON file holding an array of match records
    #[clap(short, long)]
    input: PathBuf,

    /// Minimum match probability (0.0-1.0); overrides the config file
    #[clap(short, long)]
    threshold: Option<f64>,

    /// Smallest cluster size to keep
    #[clap(long)]
    min_size: Option<usize>,

    /// Largest cluster size to keep
    #[clap(long)]
    max_size: Option<usize>,

    /// Field tried first when resolving entity ids
    #[clap(long)]
    primary_key: Option<String>,

    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// CSV file with the original records; enriches `--format json` output
    #[clap(long)]
    records: Option<PathBuf>,

    /// Table name the records are loaded under
    #[clap(long)]
    table: Option<String>,

    /// Id column of the records file
    #[clap(long)]
    id_column: Option<String>,

    /// Output format
    #[clap(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,
}

fn load_config(cli: &Cli) -> Result<ResolutionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ResolutionConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ResolutionConfig::default(),
    };

    if let Some(threshold) = cli.threshold {
        config.min_probability = threshold;
    }
    if let Some(key) = &cli.primary_key {
        config.primary_key = Some(key.clone());
    }
    if cli.min_size.is_some() || cli.max_size.is_some() {
        let current = config.size_range;
        let min = cli
            .min_size
            .or(current.map(|r| r.min()))
            .unwrap_or(1);
        let max = cli
            .max_size
            .or(current.map(|r| r.max()))
            .unwrap_or(usize::MAX);
        config.size_range = Some(SizeRange::new(min, max)?);
    }
    config.validate()?;
    Ok(config)
}

fn load_matches(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    match value {
        Value::Array(records) => Ok(records),
        _ => bail!("{} must contain a JSON array of match records", path.display()),
    }
}

/// Enrichment flags that have no effect with the chosen output format.
fn ignored_enrichment_flags(cli: &Cli) -> Vec<&'static str> {
    if matches!(cli.format, OutputFormat::Json) {
        return Vec::new();
    }
    [
        ("--records", cli.records.is_some()),
        ("--table", cli.table.is_some()),
        ("--id-column", cli.id_column.is_some()),
    ]
    .into_iter()
    .filter_map(|(flag, set)| set.then_some(flag))
    .collect()
}

fn enrich(cli: &Cli, config: &ResolutionConfig, clusters: ClusterSet) -> Result<ClusterSet> {
    let Some(path) = &cli.records else {
        return Ok(clusters);
    };

    let table = cli
        .table
        .clone()
        .or_else(|| config.enrichment.as_ref().map(|e| e.table.clone()))
        .unwrap_or_else(|| DEFAULT_TABLE.to_string());
    let id_column = cli
        .id_column
        .clone()
        .or_else(|| config.enrichment.as_ref().and_then(|e| e.id_column.clone()));

    let store = Arc::new(InMemoryRecordStore::new());
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let rows = store
        .load_csv(&table, BufReader::new(file))
        .with_context(|| format!("loading {}", path.display()))?;
    info!(table = %table, rows, "loaded records for enrichment");

    let mut enricher = RecordEnricher::new(store, table);
    if let Some(column) = id_column {
        enricher = enricher.with_id_column(column);
    }
    let outcome = enricher.enrich(&clusters);
    if let Some(warning) = &outcome.warning {
        warn!("continuing without enrichment: {warning}");
    }
    Ok(outcome.apply(&clusters))
}

fn main() -> Result<()> {
    init_logging(DEFAULT_FILTER);
    let cli = Cli::parse();

    let ignored = ignored_enrichment_flags(&cli);
    if !ignored.is_empty() {
        warn!(
            format = ?cli.format,
            "{} only apply to --format json and will be ignored",
            ignored.join(", ")
        );
    }

    let config = load_config(&cli)?;
    let raw = load_matches(&cli.input)?;
    let resolution = resolve(&raw, &config)?;
    for rejection in &resolution.rejections {
        warn!(index = rejection.index, code = rejection.code, "{}", rejection.message);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        OutputFormat::Csv => write_csv(&resolution.clusters, &mut out)?,
        OutputFormat::Json => {
            let clusters = enrich(&cli, &config, resolution.clusters)?;
            serde_json::to_writer_pretty(&mut out, &clusters)?;
            writeln!(out)?;
        }
        OutputFormat::Stats => {
            let summary = json!({
                "statistics": resolution.statistics,
                "accepted": resolution.accepted,
                "rejected": resolution.rejections.len(),
            });
            serde_json::to_writer_pretty(&mut out, &summary)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
