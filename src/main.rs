#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tabstat::analysis::classify::classify;
use tabstat::analysis::inference::{Significance, DEFAULT_NORMALITY_ALPHA};
use tabstat::analysis::output::{build_summary, write_json, ChartData};
use tabstat::csv_reader::delimiter_for;
use tabstat::structs::{
    CategoricalImputation, CorrelationMethod, ImputationStrategy, NumericImputation, RawTable,
};
use tabstat::{run_pipeline, AnalysisConfig, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tabstat - statistical profiling of CSV/TSV datasets
#[derive(Parser, Debug)]
#[command(name = "tabstat")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean a dataset and report descriptive statistics, correlations and tests
    Analyze {
        /// Input CSV/TSV file to analyze
        #[arg(short, long)]
        csv: PathBuf,

        /// Treat input as TSV instead of CSV
        #[arg(long)]
        tsv: bool,

        /// Fill rule for missing numeric cells
        #[arg(long, value_enum, default_value = "mean")]
        numeric_fill: NumericFill,

        /// Fill missing categorical cells with this value instead of the mode
        #[arg(long)]
        categorical_constant: Option<String>,

        /// Histogram bins per numeric column (default: Sturges' rule)
        #[arg(long)]
        bins: Option<usize>,

        /// Correlation coefficient
        #[arg(long, value_enum, default_value = "pearson")]
        correlation: CorrelationArg,

        /// Significance level for every test
        #[arg(long, default_value_t = DEFAULT_NORMALITY_ALPHA)]
        alpha: f64,

        /// Significance level for normality tests (overrides --alpha)
        #[arg(long)]
        normality_alpha: Option<f64>,

        /// Significance level for independence tests (overrides --alpha)
        #[arg(long)]
        independence_alpha: Option<f64>,

        /// Disable Yates' continuity correction on 2x2 tables
        #[arg(long)]
        no_yates: bool,

        /// Print the full report as JSON on stdout
        #[arg(long, conflicts_with = "chart_data")]
        json: bool,

        /// Print histogram, frequency and correlation data as JSON on stdout
        #[arg(long)]
        chart_data: bool,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Only log warnings and errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Load a dataset and show each column's type and missing count
    Inspect {
        /// Input CSV/TSV file
        #[arg(short, long)]
        csv: PathBuf,

        /// Treat input as TSV instead of CSV
        #[arg(long)]
        tsv: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum NumericFill {
    Mean,
    Median,
}

impl From<NumericFill> for NumericImputation {
    fn from(fill: NumericFill) -> Self {
        match fill {
            NumericFill::Mean => Self::Mean,
            NumericFill::Median => Self::Median,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CorrelationArg {
    Pearson,
    Spearman,
}

impl From<CorrelationArg> for CorrelationMethod {
    fn from(arg: CorrelationArg) -> Self {
        match arg {
            CorrelationArg::Pearson => Self::Pearson,
            CorrelationArg::Spearman => Self::Spearman,
        }
    }
}

/// Install the stderr subscriber. Machine-readable output runs without logs
/// so stdout carries only JSON.
fn init_logging(level: &str, quiet: bool, machine_output: bool) {
    if machine_output {
        return;
    }

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Analyze {
            csv,
            tsv,
            numeric_fill,
            categorical_constant,
            bins,
            correlation,
            alpha,
            normality_alpha,
            independence_alpha,
            no_yates,
            json,
            chart_data,
            log_level,
            quiet,
        } => {
            init_logging(&log_level, quiet, json || chart_data);

            let config = AnalysisConfig {
                delimiter: Some(delimiter_for(&csv, tsv)),
                imputation: ImputationStrategy {
                    numeric: numeric_fill.into(),
                    categorical: categorical_constant
                        .map_or(CategoricalImputation::Mode, CategoricalImputation::Constant),
                },
                bins,
                correlation: correlation.into(),
                significance: Significance {
                    normality_alpha: normality_alpha.unwrap_or(alpha),
                    independence_alpha: independence_alpha.unwrap_or(alpha),
                },
                yates_correction: !no_yates,
            };

            let output = if json {
                Output::Json
            } else if chart_data {
                Output::ChartData
            } else {
                Output::Summary
            };
            run_analyze(&csv, &config, output)
        }

        Commands::Inspect { csv, tsv } => {
            init_logging("warn", false, false);
            run_inspect(&csv, tsv)
        }
    }
}

enum Output {
    Summary,
    Json,
    ChartData,
}

/// Run the analysis and print the requested report to stdout
fn run_analyze(csv_path: &Path, config: &AnalysisConfig, output: Output) -> Result<()> {
    info!("Analyzing: {}", csv_path.display());

    let report = run_pipeline(csv_path, config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match output {
        Output::Summary => out.write_all(build_summary(&report).as_bytes())?,
        Output::Json => {
            write_json(&mut out, &report)?;
            writeln!(out)?;
        }
        Output::ChartData => {
            serde_json::to_writer_pretty(&mut out, &ChartData::from_report(&report))?;
            writeln!(out)?;
        }
    }
    out.flush()?;

    Ok(())
}

/// Load and classify only
fn run_inspect(csv_path: &Path, tsv: bool) -> Result<()> {
    let table = RawTable::from_file(csv_path, delimiter_for(csv_path, tsv))?;
    let dataset = classify(&table)?;

    println!(
        "{}: {} rows x {} columns",
        table.source,
        dataset.n_rows(),
        dataset.n_cols()
    );
    for column in dataset.columns() {
        println!(
            "  {:<24} {:<12} {} missing",
            column.name,
            column.semantic_type().to_string(),
            column.missing_count()
        );
    }

    Ok(())
}
