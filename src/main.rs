//! Food Waste Estimator - Main Entry Point
//!
//! Serves the estimation form and JSON API, or runs single and batch
//! estimates from the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use food_waste_estimator::{
    config::{AppConfig, LoggingConfig},
    error::ErrorResponse,
    features::CategoricalEncoder,
    metrics::{MetricsReporter, ServiceMetrics},
    pipeline::Estimator,
    server::{self, AppState},
    types::{estimate::Estimate, record::WasteRecord},
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Food waste economic loss estimator
#[derive(Parser)]
#[command(name = "food-waste-estimator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web form and JSON API
    Serve {
        /// Address to bind, overriding the configuration
        #[arg(long)]
        bind: Option<String>,
    },
    /// Estimate one record; unspecified fields take the form defaults
    Predict(PredictArgs),
    /// Estimate every record of a JSON Lines file
    ///
    /// Writes one JSON result (estimate or error) per input line.
    Batch {
        /// Input file, one record per line
        #[arg(long)]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the feature contract, scaler, encoders and models
    Inspect,
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    food_category: Option<String>,

    /// Total waste in tons
    #[arg(long)]
    total_waste: Option<f64>,

    /// Average waste per capita in kg
    #[arg(long)]
    avg_waste: Option<f64>,

    /// Population in millions
    #[arg(long)]
    population: Option<f64>,

    /// Household waste share in percent
    #[arg(long)]
    household_waste: Option<f64>,
}

/// One line of batch output
#[derive(Serialize)]
#[serde(untagged)]
enum BatchResult {
    Estimate(Box<Estimate>),
    Error {
        line: usize,
        #[serde(flatten)]
        error: ErrorResponse,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_path(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    init_logging(&config.logging)?;
    info!(path = ?cli.config, "Configuration loaded successfully");

    let estimator = Estimator::from_config(&config)?;

    match cli.command {
        Commands::Serve { bind } => {
            serve(config, estimator, bind).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Predict(args) => Ok(predict(&estimator, args)),
        Commands::Batch { input, output } => {
            batch(&estimator, &input, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect => {
            inspect(&estimator);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize logging on stderr so command output stays clean
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("food_waste_estimator={}", logging.level).parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

async fn serve(config: AppConfig, estimator: Estimator, bind: Option<String>) -> Result<()> {
    let metrics = Arc::new(ServiceMetrics::new());

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = AppState::new(estimator, metrics)?;
    let bind = bind.unwrap_or(config.server.bind);
    server::serve(state, &bind).await
}

fn predict(estimator: &Estimator, args: PredictArgs) -> ExitCode {
    let defaults = estimator.schema().default_record();
    let record = WasteRecord::new(
        &args.country.unwrap_or(defaults.country),
        args.year.unwrap_or(defaults.year),
        &args.food_category.unwrap_or(defaults.food_category),
        args.total_waste.unwrap_or(defaults.total_waste_tons),
        args.avg_waste.unwrap_or(defaults.avg_waste_per_capita_kg),
        args.population.unwrap_or(defaults.population_million),
        args.household_waste.unwrap_or(defaults.household_waste_pct),
    );

    match estimator.estimate(&record) {
        Ok(estimate) => {
            let format = &estimator.display().format;
            println!(
                "Estimated economic loss: {} ({})",
                format.amount(estimate.economic_loss_million),
                estimate.loss_level.as_str()
            );
            if let Some(category) = &estimate.waste_category {
                println!(
                    "Waste level: {} ({:.0}% confidence)",
                    category.label,
                    category.confidence * 100.0
                );
            }
            if estimate.model_estimates.len() > 1 {
                for (name, value) in &estimate.model_estimates {
                    println!("  {}: {}", name, format.amount(*value));
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Cannot estimate: {}", e);
            if e.is_validation() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn batch(estimator: &Estimator, input: &Path, output: Option<&Path>) -> Result<()> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {:?}", input))?,
    );
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let metrics = ServiceMetrics::new();
    info!(input = ?input, "Starting batch estimation");

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;
        let start_time = Instant::now();

        let result = match serde_json::from_str::<WasteRecord>(&line) {
            Ok(record) => match estimator.estimate(&record) {
                Ok(estimate) => {
                    metrics.record_estimate(start_time.elapsed(), estimate.loss_level.as_str());
                    metrics.record_spread(&estimate.model_estimates);
                    BatchResult::Estimate(Box::new(estimate))
                }
                Err(e) => {
                    metrics.record_rejection(start_time.elapsed(), e.kind(), e.is_validation());
                    warn!(line = line_no, record_id = %record.record_id, error = %e, "Record rejected");
                    BatchResult::Error {
                        line: line_no,
                        error: e.to_response(),
                    }
                }
            },
            Err(e) => {
                metrics.record_rejection(start_time.elapsed(), "invalid_record", true);
                warn!(line = line_no, error = %e, "Failed to deserialize record");
                BatchResult::Error {
                    line: line_no,
                    error: ErrorResponse {
                        error: e.to_string(),
                        kind: "invalid_record".to_string(),
                        field: None,
                    },
                }
            }
        };

        serde_json::to_writer(&mut writer, &result)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    metrics.print_summary();
    Ok(())
}

fn inspect(estimator: &Estimator) {
    let extractor = estimator.extractor();
    let contract = extractor.contract();

    println!("Feature contract ({} features)", contract.len());
    if let Some(target) = &contract.target {
        println!("  target: {}", target);
    }
    for (i, name) in contract.features.iter().enumerate() {
        println!("  {:>3}  {}", i, name);
    }

    let scaler = extractor.scaler();
    println!("Scaler: {} over {} columns", scaler.kind(), scaler.n_features());
    for name in scaler.feature_names() {
        println!("  {}", name);
    }

    println!("Encoders (unknown categories: {:?})", extractor.policy());
    for (column, encoder) in extractor.encoders().iter() {
        let kind = match encoder {
            CategoricalEncoder::Label { .. } => "label",
            CategoricalEncoder::OneHot { .. } => "one_hot",
        };
        println!(
            "  {}: {} [{}]",
            column,
            kind,
            encoder.categories().join(", ")
        );
    }

    let engine = estimator.engine();
    println!("Models (strategy: {:?})", engine.strategy());
    for name in engine.model_names() {
        println!("  {}", name);
    }
}
