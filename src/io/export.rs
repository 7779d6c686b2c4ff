//! CSV exports: generated/split frames and aligned evaluation forecasts.
//!
//! Meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::domain::{format_timestamp, FrameSchema, SeriesFrame};
use crate::error::AppError;
use crate::report::EvaluationRow;
use crate::split::SplitPart;

/// Write a frame back out in its own column layout.
pub fn write_frame_csv(path: &Path, frame: &SeriesFrame) -> Result<(), AppError> {
    let file = create(path)?;
    write_frame(file, frame)?;
    tracing::info!(path = %path.display(), rows = frame.len(), "Wrote CSV");
    Ok(())
}

pub fn write_frame<W: Write>(out: W, frame: &SeriesFrame) -> Result<(), AppError> {
    let schema = &frame.schema;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(header(schema)).map_err(write_err)?;

    for record in &frame.records {
        let mut fields = vec![format_timestamp(record.timestamp)];
        if schema.has_grains() {
            fields.extend(record.grain.values().iter().cloned());
        }
        fields.push(record.target.map(|v| v.to_string()).unwrap_or_default());
        fields.extend(record.covariates.iter().map(cell));
        writer.write_record(&fields).map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::runtime(format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// Write one side of a temporal split; `position` is kept so rows can be traced back.
pub fn write_split_csv(path: &Path, part: &SplitPart, schema: &FrameSchema) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    let mut head = vec!["position".to_string()];
    head.extend(header(schema));
    writer.write_record(&head).map_err(write_err)?;

    for (row, y) in part.rows.iter().zip(&part.target) {
        let mut fields = vec![row.position.to_string(), format_timestamp(row.timestamp)];
        if schema.has_grains() {
            fields.extend(row.grain.values().iter().cloned());
        }
        fields.push(y.map(|v| v.to_string()).unwrap_or_default());
        fields.extend(row.covariates.iter().map(cell));
        writer.write_record(&fields).map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::runtime(format!("Failed to flush CSV: {e}")))?;
    tracing::info!(path = %path.display(), rows = part.len(), "Wrote split CSV");
    Ok(())
}

/// Write evaluation rows: time, grain(s), actual, forecast, error.
pub fn write_forecast_csv(path: &Path, rows: &[EvaluationRow], schema: &FrameSchema) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(create(path)?);

    let mut head = vec![schema.time_column.clone()];
    head.extend(schema.grain_columns.iter().cloned());
    head.extend(["actual", "forecast", "error"].map(String::from));
    writer.write_record(&head).map_err(write_err)?;

    for r in rows {
        let mut fields = vec![format_timestamp(r.timestamp)];
        if schema.has_grains() {
            fields.extend(r.grain.values().iter().cloned());
        }
        let err = match (r.actual, r.predicted) {
            (Some(a), Some(p)) => Some(a - p),
            _ => None,
        };
        for v in [r.actual, r.predicted, err] {
            fields.push(v.map(|x| format!("{x:.4}")).unwrap_or_default());
        }
        writer.write_record(&fields).map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::runtime(format!("Failed to flush CSV: {e}")))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Wrote forecast CSV");
    Ok(())
}

fn header(schema: &FrameSchema) -> Vec<String> {
    let mut head = vec![schema.time_column.clone()];
    head.extend(schema.grain_columns.iter().cloned());
    head.push(schema.target_column.clone());
    head.extend(schema.covariate_columns.iter().cloned());
    head
}

fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::runtime(format!("Failed to create CSV '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::runtime(format!("Failed to write CSV row: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_timestamp, GrainKey, SeriesRecord};
    use crate::io::ingest::{load_series_from_reader, IngestSpec};

    fn frame() -> SeriesFrame {
        SeriesFrame {
            schema: FrameSchema {
                time_column: "timeStamp".to_string(),
                target_column: "demand".to_string(),
                grain_columns: vec!["meter".to_string()],
                covariate_columns: vec!["temp".to_string(), "note".to_string()],
            },
            records: vec![
                SeriesRecord {
                    timestamp: parse_timestamp("2017-01-31 23:00").unwrap(),
                    grain: GrainKey(vec!["m1".to_string()]),
                    target: Some(100.5),
                    covariates: vec![Value::from(21.5), Value::from("a, b")],
                },
                SeriesRecord {
                    timestamp: parse_timestamp("2017-02-01 00:00").unwrap(),
                    grain: GrainKey(vec!["m1".to_string()]),
                    target: None,
                    covariates: vec![Value::from(20), Value::Null],
                },
            ],
        }
    }

    #[test]
    fn frame_csv_is_quoted_and_keeps_blanks() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timeStamp,meter,demand,temp,note");
        assert_eq!(lines[1], "2017-01-31 23:00:00,m1,100.5,21.5,\"a, b\"");
        assert_eq!(lines[2], "2017-02-01 00:00:00,m1,,20,");
    }

    #[test]
    fn written_frame_loads_back() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame()).unwrap();
        let spec = IngestSpec {
            time_column: "timeStamp".to_string(),
            target_column: "demand".to_string(),
            grain_columns: vec!["meter".to_string()],
        };
        let ingested = load_series_from_reader(buf.as_slice(), &spec).unwrap();
        assert_eq!(ingested.frame.records.len(), 2);
        assert_eq!(ingested.frame.records[1].target, None);
        assert_eq!(ingested.frame.schema.covariate_columns, vec!["temp", "note"]);
    }
}
