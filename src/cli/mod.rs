//! Command-line parsing for the demand forecaster.
//!
//! Argument parsing and dispatch stay separate from the forecasting code.
//! Most column/task options fall back to `DEMAND_*` environment variables,
//! which may also come from a `.env` file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{parse_timestamp, ForecastSettings, Timestamp};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "demand", version, about = "Hourly energy demand forecasting and scoring")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split a series at the cutoff and report (or write) both sides.
    Split(SplitArgs),
    /// Train the seasonal baseline, evaluate it on the test side, and optionally
    /// register the model and its service config.
    Fit(FitArgs),
    /// Score one request JSON (file or stdin) against a registered model.
    Score(ScoreArgs),
    /// Serve the scoring endpoint over HTTP.
    Serve(ServeArgs),
    /// Write a synthetic hourly demand CSV.
    Generate(GenerateArgs),
}

/// Column layout and forecasting task shared by `split` and `fit`.
#[derive(Debug, Args, Clone)]
pub struct TaskArgs {
    /// Time column name.
    #[arg(long, env = "DEMAND_TIME_COLUMN", default_value = "timeStamp")]
    pub time_column: String,

    /// Target column name.
    #[arg(long, env = "DEMAND_TARGET_COLUMN", default_value = "demand")]
    pub target_column: String,

    /// Grain (series id) columns, comma-separated. Empty = a single series.
    #[arg(long, env = "DEMAND_GRAIN_COLUMNS", value_delimiter = ',')]
    pub grain_columns: Vec<String>,

    /// Split cutoff; rows strictly before it are training data.
    #[arg(long, env = "DEMAND_CUTOFF", default_value = "2017-02-01", value_parser = parse_cli_timestamp)]
    pub cutoff: Timestamp,

    /// Maximum number of steps forecast past the last known value.
    #[arg(long, env = "DEMAND_MAX_HORIZON", default_value_t = 48)]
    pub max_horizon: usize,

    /// Seasonal lag in hours for the baseline model.
    #[arg(long, default_value_t = 24)]
    pub season_hours: i64,
}

impl TaskArgs {
    pub fn settings(&self) -> ForecastSettings {
        ForecastSettings {
            time_column: self.time_column.trim().to_string(),
            target_column: self.target_column.trim().to_string(),
            grain_columns: self
                .grain_columns
                .iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            cutoff: self.cutoff,
            max_horizon: self.max_horizon,
            season_hours: self.season_hours,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct SplitArgs {
    /// Input CSV path or http(s) URL.
    #[arg(short = 'd', long, env = "DEMAND_DATA", value_name = "CSV")]
    pub data: String,

    #[command(flatten)]
    pub task: TaskArgs,

    /// Write the training rows to this CSV.
    #[arg(long, value_name = "CSV")]
    pub train_out: Option<PathBuf>,

    /// Write the test rows to this CSV.
    #[arg(long, value_name = "CSV")]
    pub test_out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Input CSV path or http(s) URL.
    #[arg(short = 'd', long, env = "DEMAND_DATA", value_name = "CSV")]
    pub data: String,

    #[command(flatten)]
    pub task: TaskArgs,

    /// Test rows shown in the preview table.
    #[arg(long, default_value_t = 10)]
    pub preview: usize,

    /// Render an ASCII plot of actual vs forecast (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Test rows covered by the plot.
    #[arg(long, default_value_t = 168)]
    pub plot_rows: usize,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the aligned test forecast to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Save the fitted model artifact (JSON).
    #[arg(long, value_name = "JSON")]
    pub save_model: Option<PathBuf>,

    /// Write the scoring service config (JSON). Requires `--save-model`.
    #[arg(long, value_name = "JSON", requires = "save_model")]
    pub write_config: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    /// Service config written by `demand fit --write-config`.
    #[arg(short = 'c', long, env = "DEMAND_SERVICE_CONFIG", value_name = "JSON")]
    pub config: PathBuf,

    /// Request JSON file; `-` reads stdin.
    #[arg(short = 'i', long, default_value = "-", value_name = "JSON")]
    pub input: String,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    /// Service config written by `demand fit --write-config`.
    #[arg(short = 'c', long, env = "DEMAND_SERVICE_CONFIG", value_name = "JSON")]
    pub config: PathBuf,

    #[arg(long, env = "DEMAND_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "DEMAND_PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,

    /// First timestamp of the series.
    #[arg(long, default_value = "2016-12-01", value_parser = parse_cli_timestamp)]
    pub start: Timestamp,

    /// Number of hourly rows per meter.
    #[arg(long, default_value_t = 24 * 70)]
    pub hours: usize,

    /// Number of meters; more than one adds a `meter` grain column.
    #[arg(long, default_value_t = 1)]
    pub grains: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Std dev of the demand noise (MW).
    #[arg(long, default_value_t = 25.0)]
    pub noise_sd: f64,

    /// Probability of leaving a demand cell empty.
    #[arg(long, default_value_t = 0.0)]
    pub missing_prob: f64,
}

fn parse_cli_timestamp(s: &str) -> Result<Timestamp, String> {
    parse_timestamp(s)
}
