//! CSV ingest and normalization.
//!
//! This module is responsible for turning an hourly demand CSV into a clean
//! `SeriesFrame` of `(timestamp, grain, target, covariates)` records.
//!
//! Design goals:
//! - **Strict schema** for the time/target/grain columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Pass-through covariates** (every other column is kept as-is)
//! - **Separation of concerns**: no splitting or forecasting logic here

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;

use csv::StringRecord;
use serde_json::Value;

use crate::domain::{
    parse_timestamp, ForecastSettings, FrameSchema, GrainKey, SeriesFrame, SeriesRecord, Timestamp,
};
use crate::error::AppError;

/// Which columns carry the time index, the target and the grain.
#[derive(Debug, Clone)]
pub struct IngestSpec {
    pub time_column: String,
    pub target_column: String,
    pub grain_columns: Vec<String>,
}

impl From<&ForecastSettings> for IngestSpec {
    fn from(settings: &ForecastSettings) -> Self {
        Self {
            time_column: settings.time_column.clone(),
            target_column: settings.target_column.clone(),
            grain_columns: settings.grain_columns.clone(),
        }
    }
}

/// Summary stats about the records actually kept.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_records: usize,
    pub n_grains: usize,
    pub time_min: Timestamp,
    pub time_max: Timestamp,
    /// `None` when every target cell was empty.
    pub target_range: Option<(f64, f64)>,
    pub missing_targets: usize,
    /// Rows whose timestamp went backwards within their grain.
    pub out_of_order: usize,
    /// Rows repeating an earlier `(timestamp, grain)` pair.
    pub duplicate_keys: usize,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: frame + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub frame: SeriesFrame,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a series from a local path or an `http(s)://` URL.
pub fn load_series(source: &str, spec: &IngestSpec) -> Result<IngestedData, AppError> {
    if crate::data::is_remote(source) {
        let body = crate::data::fetch_csv(source)?;
        return load_series_from_reader(body.as_bytes(), spec);
    }

    let file = File::open(source)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{source}': {e}")))?;
    load_series_from_reader(file, spec)
}

/// Load a series from any CSV byte stream.
pub fn load_series_from_reader<R: Read>(input: R, spec: &IngestSpec) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let layout = ColumnLayout::resolve(&headers, spec)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header and CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &layout) {
            Ok(r) => records.push(r),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let rows_used = records.len();
    if !row_errors.is_empty() {
        tracing::warn!(
            skipped = row_errors.len(),
            first_line = row_errors[0].line,
            first_error = %row_errors[0].message,
            "Skipped invalid CSV rows"
        );
    }

    let stats = compute_stats(&records)
        .ok_or_else(|| AppError::no_data("No valid rows remain after ingest."))?;

    if stats.out_of_order > 0 {
        tracing::warn!(
            rows = stats.out_of_order,
            "Timestamps are not monotonically non-decreasing within their grain"
        );
    }
    if stats.duplicate_keys > 0 {
        tracing::warn!(rows = stats.duplicate_keys, "Repeated (timestamp, grain) pairs in input");
    }

    tracing::info!(rows_read, rows_used, grains = stats.n_grains, "Loaded series");

    Ok(IngestedData {
        frame: SeriesFrame {
            schema: layout.schema,
            records,
        },
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Resolved column indices for one CSV header.
struct ColumnLayout {
    schema: FrameSchema,
    time_idx: usize,
    target_idx: usize,
    grain_idx: Vec<usize>,
    covariate_idx: Vec<usize>,
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord, spec: &IngestSpec) -> Result<Self, AppError> {
        let names: Vec<String> = headers.iter().map(clean_header_name).collect();
        let header_map: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_ascii_lowercase(), idx))
            .collect();

        let lookup = |name: &str, role: &str| -> Result<usize, AppError> {
            header_map
                .get(&name.trim().to_ascii_lowercase())
                .copied()
                .ok_or_else(|| AppError::input(format!("Missing required {role} column: `{name}`")))
        };

        let time_idx = lookup(spec.time_column.as_str(), "time")?;
        let target_idx = lookup(spec.target_column.as_str(), "target")?;
        let grain_idx = spec
            .grain_columns
            .iter()
            .map(|g| lookup(g.as_str(), "grain"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut claimed: HashSet<usize> = grain_idx.iter().copied().collect();
        claimed.insert(time_idx);
        claimed.insert(target_idx);
        let covariate_idx: Vec<usize> = (0..names.len()).filter(|i| !claimed.contains(i)).collect();

        let schema = FrameSchema {
            time_column: names[time_idx].clone(),
            target_column: names[target_idx].clone(),
            grain_columns: grain_idx.iter().map(|&i| names[i].clone()).collect(),
            covariate_columns: covariate_idx.iter().map(|&i| names[i].clone()).collect(),
        };

        Ok(Self {
            schema,
            time_idx,
            target_idx,
            grain_idx,
            covariate_idx,
        })
    }
}

fn clean_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_row(record: &StringRecord, layout: &ColumnLayout) -> Result<SeriesRecord, String> {
    let time_raw = get_cell(record, layout.time_idx)
        .ok_or_else(|| format!("Missing value for `{}`.", layout.schema.time_column))?;
    let timestamp = parse_timestamp(time_raw)?;

    let target = match get_cell(record, layout.target_idx) {
        None => None,
        Some(raw) => parse_target(raw).ok_or_else(|| {
            format!(
                "Invalid `{}` value '{raw}' (expected a number).",
                layout.schema.target_column
            )
        })?,
    };

    let grain = if layout.grain_idx.is_empty() {
        GrainKey::single()
    } else {
        let mut values = Vec::with_capacity(layout.grain_idx.len());
        for (&idx, name) in layout.grain_idx.iter().zip(&layout.schema.grain_columns) {
            let v = get_cell(record, idx).ok_or_else(|| format!("Missing grain value for `{name}`."))?;
            values.push(v.to_string());
        }
        GrainKey(values)
    };

    let covariates = layout
        .covariate_idx
        .iter()
        .map(|&idx| get_cell(record, idx).map(parse_cell).unwrap_or(Value::Null))
        .collect();

    Ok(SeriesRecord {
        timestamp,
        grain,
        target,
        covariates,
    })
}

/// `Some(None)` for explicit NaN markers, `None` when the cell is not numeric.
fn parse_target(raw: &str) -> Option<Option<f64>> {
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() { Some(Some(v)) } else { Some(None) }
}

/// Convert a covariate cell into a JSON value (integer, float, or text).
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        // NaN/inf have no JSON representation.
        return serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    Value::String(raw.to_string())
}

fn get_cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn compute_stats(records: &[SeriesRecord]) -> Option<DatasetStats> {
    let (time_min, time_max) = crate::domain::time_range(records.iter().map(|r| r.timestamp))?;

    let mut target_range: Option<(f64, f64)> = None;
    let mut missing_targets = 0usize;
    let mut out_of_order = 0usize;
    let mut duplicate_keys = 0usize;
    let mut last_seen: HashMap<&GrainKey, Timestamp> = HashMap::new();
    let mut keys: HashSet<(Timestamp, &GrainKey)> = HashSet::with_capacity(records.len());

    for r in records {
        match r.target {
            Some(y) => {
                target_range = Some(match target_range {
                    None => (y, y),
                    Some((lo, hi)) => (lo.min(y), hi.max(y)),
                });
            }
            None => missing_targets += 1,
        }

        if let Some(prev) = last_seen.insert(&r.grain, r.timestamp) {
            if r.timestamp < prev {
                out_of_order += 1;
            }
        }
        if !keys.insert((r.timestamp, &r.grain)) {
            duplicate_keys += 1;
        }
    }

    Some(DatasetStats {
        n_records: records.len(),
        n_grains: last_seen.len(),
        time_min,
        time_max,
        target_range,
        missing_targets,
        out_of_order,
        duplicate_keys,
    })
}
