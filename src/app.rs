//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the fit pipeline and prints reports/plots
//! - registers models and serves the scoring boundary

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, GenerateArgs, ScoreArgs, ServeArgs, SplitArgs};
use crate::error::AppError;
use crate::models::ForecastModel;
use crate::scoring::{ScoringContext, ServiceConfig};

pub mod pipeline;

/// Entry point for the `demand` binary.
pub fn run() -> Result<(), AppError> {
    // Must happen before parsing so `.env` values feed clap's env fallbacks.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Split(args) => handle_split(args),
        Command::Fit(args) => handle_fit(args),
        Command::Score(args) => handle_score(args),
        Command::Serve(args) => handle_serve(args),
        Command::Generate(args) => handle_generate(args),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("demand_forecast=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_split(args: SplitArgs) -> Result<(), AppError> {
    let settings = args.task.settings();
    let (ingest, split) = pipeline::run_split(&args.data, &settings)?;

    println!(
        "Rows: read={} | used={} | skipped={}",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    );
    print!("{}", split.summary());

    if let Some(path) = &args.train_out {
        crate::io::export::write_split_csv(path, &split.train, &split.schema)?;
    }
    if let Some(path) = &args.test_out {
        crate::io::export::write_split_csv(path, &split.test, &split.schema)?;
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let settings = args.task.settings();
    let run = pipeline::run_fit(&args.data, &settings)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.split, &settings, run.model.name())
    );
    println!("{}", crate::report::format_metrics(&run.evaluation));

    if args.preview > 0 && !run.evaluation.rows.is_empty() {
        println!(
            "{}",
            crate::report::format_preview(&run.evaluation.rows, args.preview, run.split.schema.has_grains())
        );
    }

    if args.plot && !args.no_plot && !run.evaluation.rows.is_empty() {
        // One series keeps the picture readable.
        let first = &run.evaluation.rows[0].grain;
        let rows: Vec<_> = run
            .evaluation
            .rows
            .iter()
            .filter(|r| &r.grain == first)
            .take(args.plot_rows)
            .cloned()
            .collect();
        println!("{}", crate::plot::render_forecast_plot(&rows, args.width, args.height));
    }

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::export::write_forecast_csv(path, &run.evaluation.rows, &run.split.schema)?;
    }
    if let Some(model_path) = &args.save_model {
        crate::io::write_model_artifact(model_path, &run.model)?;

        if let Some(config_path) = &args.write_config {
            let config = ServiceConfig::from_parts(
                &run.split.schema,
                &settings,
                model_path_for_config(model_path, config_path)?,
            );
            crate::io::write_service_config(config_path, &config)?;
        }
    }

    Ok(())
}

fn handle_score(args: ScoreArgs) -> Result<(), AppError> {
    let ctx = ScoringContext::from_config(&args.config)?;

    let body = if args.input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::input(format!("Failed to read request from stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .map_err(|e| AppError::input(format!("Failed to read request '{}': {e}", args.input)))?
    };

    // Errors are part of the response body, same as over HTTP.
    println!("{}", ctx.score(&body).to_json());
    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let ctx = Arc::new(ScoringContext::from_config(&args.config)?);
    let config = crate::server::ServerConfig {
        host: args.host,
        port: args.port,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::runtime(format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::run_server(config, ctx))
}

fn handle_generate(args: GenerateArgs) -> Result<(), AppError> {
    let frame = crate::data::generate_sample(&crate::data::SampleConfig {
        start: args.start,
        hours: args.hours,
        grains: args.grains,
        seed: args.seed,
        noise_sd: args.noise_sd,
        missing_prob: args.missing_prob,
    })?;
    crate::io::export::write_frame_csv(&args.output, &frame)?;

    if let Some((lo, hi)) = frame.time_range() {
        println!(
            "Wrote {} rows to {} | [{}, {}]",
            frame.len(),
            args.output.display(),
            crate::domain::format_timestamp(lo),
            crate::domain::format_timestamp(hi)
        );
    }
    Ok(())
}

/// Model path as stored in the service config: relative to the config file
/// when both share a directory, absolute otherwise.
fn model_path_for_config(model_path: &Path, config_path: &Path) -> Result<PathBuf, AppError> {
    let model_dir = model_path.parent().unwrap_or_else(|| Path::new(""));
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    if model_dir == config_dir {
        if let Some(name) = model_path.file_name() {
            return Ok(PathBuf::from(name));
        }
    }
    std::path::absolute(model_path)
        .map_err(|e| AppError::runtime(format!("Failed to resolve '{}': {e}", model_path.display())))
}
