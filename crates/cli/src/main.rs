use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use market_analysis::ReportEngine;
use market_core::config::TrendAlgorithm;
use market_core::{format_ts, AllowList, TimestampSecs, TrendResult};
use market_ingestion::ItemFilter;
use tracing::info;

mod settings;

#[derive(Parser)]
#[command(name = "market-trends")]
#[command(about = "Compact marketplace snapshots and report price trends", long_about = None)]
struct Cli {
    /// Optional TOML settings file
    #[arg(short, long, global = true, env = "MARKET_CONFIG")]
    config: Option<PathBuf>,

    /// Reference instant in epoch seconds (defaults to now)
    #[arg(long, global = true)]
    now: Option<TimestampSecs>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the compact dataset artifact
    Compact {
        /// Directory of snapshot documents
        #[arg(short, long, default_value = "downloads")]
        snapshots: PathBuf,
        /// Allow-list JSON (category -> item ids)
        #[arg(short, long, default_value = "config.json")]
        allow_list: PathBuf,
        /// Output path for the artifact (gzip-compressed when it ends in `.gz`)
        #[arg(short, long, default_value = "market.compact.json.gz")]
        output: PathBuf,
    },
    /// Print a ranked trend table for one window
    Analyze {
        /// Days to analyze
        #[arg(default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
        /// Directory of snapshot documents
        #[arg(short, long, default_value = "downloads")]
        snapshots: PathBuf,
        /// Restrict to items in this allow-list
        #[arg(short, long)]
        allow_list: Option<PathBuf>,
        /// Classifier variant (overrides the settings file)
        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Generalized,
    Simple,
}

impl From<AlgorithmArg> for TrendAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Generalized => TrendAlgorithm::Generalized,
            AlgorithmArg::Simple => TrendAlgorithm::Simple,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = settings::load(cli.config.as_deref())?;
    let now = cli.now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    info!(reference = %format_ts(now), "starting run");

    match cli.command {
        Commands::Compact {
            snapshots,
            allow_list,
            output,
        } => {
            let engine = ReportEngine::new(config)?;
            run_compact(&engine, &snapshots, &allow_list, &output, now)?;
        }
        Commands::Analyze {
            days,
            snapshots,
            allow_list,
            algorithm,
        } => {
            let mut config = config;
            if let Some(algorithm) = algorithm {
                config.trend.algorithm = algorithm.into();
            }
            let engine = ReportEngine::new(config)?;
            run_analyze(&engine, &snapshots, allow_list.as_deref(), days, now)?;
        }
    }

    Ok(())
}

fn run_compact(
    engine: &ReportEngine,
    snapshots: &Path,
    allow_list: &Path,
    output: &Path,
    now: TimestampSecs,
) -> Result<()> {
    let allow_list = AllowList::from_path(allow_list)?;
    anyhow::ensure!(!allow_list.is_empty(), "allow-list lists no items");

    let dataset = engine
        .run(snapshots, allow_list, now)
        .with_context(|| format!("failed to build dataset from {}", snapshots.display()))?;
    let bytes = dataset
        .write_to_path(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let windows: Vec<String> = dataset
        .trends
        .iter()
        .map(|w| format!("{}={}", w.key(), w.results.len()))
        .collect();
    println!(
        "items={}, rows={} -> {:.1} KB, {}",
        dataset.items.len(),
        dataset.rows.len(),
        bytes as f64 / 1024.0,
        windows.join(", ")
    );
    Ok(())
}

fn run_analyze(
    engine: &ReportEngine,
    snapshots: &Path,
    allow_list: Option<&Path>,
    days: u32,
    now: TimestampSecs,
) -> Result<()> {
    let filter = match allow_list {
        Some(path) => ItemFilter::from_allow_list(&AllowList::from_path(path)?),
        None => ItemFilter::allow_all(),
    };

    let results = engine
        .analyze(snapshots, days, &filter, now)
        .with_context(|| format!("failed to analyze {}", snapshots.display()))?;

    println!("Trends over the last {days} days.");
    print_table(&results);
    Ok(())
}

fn print_table(results: &[TrendResult]) {
    println!(
        "\n{:<50} {:>8} {:>4} {:>6} {:>7} {:>6} {:>17}",
        "Item", "Δ%", "Ups", "Downs", "r2", "CV", "Type"
    );
    println!("{}", "-".repeat(104));
    for r in results {
        println!(
            "{:<50} {:>8.2} {:>4} {:>6} {:>7.3} {:>6.3} {:>17}",
            r.item,
            r.percent,
            r.ups,
            r.downs,
            r.r2,
            r.volatility_cv,
            r.trend_label.as_str()
        );
    }
}
