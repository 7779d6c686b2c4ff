//! Shared "fit pipeline" logic.
//!
//! ingest -> temporal split -> seasonal baseline -> rolling evaluation
//!
//! The CLI handlers only deal with presentation and file outputs.

use crate::domain::ForecastSettings;
use crate::error::AppError;
use crate::io::ingest::{load_series, IngestSpec, IngestedData};
use crate::models::SeasonalNaive;
use crate::report::{rolling_forecast, Evaluation};
use crate::split::{temporal_split, TemporalSplit};

/// All computed outputs of a single `demand fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub split: TemporalSplit,
    pub model: SeasonalNaive,
    pub evaluation: Evaluation,
}

/// Load and split a dataset.
pub fn run_split(source: &str, settings: &ForecastSettings) -> Result<(IngestedData, TemporalSplit), AppError> {
    settings.validate()?;
    let ingest = load_series(source, &IngestSpec::from(settings))?;
    let split = temporal_split(&ingest.frame, settings.cutoff);
    Ok((ingest, split))
}

/// Execute the full pipeline from a data source.
pub fn run_fit(source: &str, settings: &ForecastSettings) -> Result<RunOutput, AppError> {
    settings.validate()?;
    let ingest = load_series(source, &IngestSpec::from(settings))?;
    run_fit_with_data(ingest, settings)
}

/// Execute the pipeline on already ingested data.
pub fn run_fit_with_data(ingest: IngestedData, settings: &ForecastSettings) -> Result<RunOutput, AppError> {
    let split = temporal_split(&ingest.frame, settings.cutoff);
    if split.train.is_empty() {
        return Err(AppError::no_data(format!(
            "No training rows before the cutoff {}.",
            crate::domain::format_timestamp(settings.cutoff)
        )));
    }

    let model = SeasonalNaive::fit(&split.train, settings)?;
    let evaluation = rolling_forecast(&model, &split.test, &split.schema, settings.max_horizon)?;

    Ok(RunOutput {
        ingest,
        split,
        model,
        evaluation,
    })
}
