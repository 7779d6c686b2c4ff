//! Scoring request decoding.
//!
//! Body shape: `{"X": <table>, "y": [number | null | "NaN", ...]}`.
//!
//! `X` is accepted as
//! - an array of row objects (`[{"timeStamp": ..., "temp": ...}, ...]`),
//! - a column-oriented object as written by pandas' `to_json()`
//!   (`{"timeStamp": {"0": ..., "1": ...}, ...}`),
//! - or a string holding either of the above.
//!
//! Any row that cannot be decoded fails the whole request.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::domain::{parse_timestamp, timestamp_from_epoch_millis, FeatureRow, FrameSchema, GrainKey, Timestamp};
use crate::error::AppError;
use crate::scoring::ServiceConfig;

type Row = Map<String, Value>;

/// A decoded request: feature rows in request order plus the known targets.
#[derive(Debug, Clone)]
pub struct ScoringRequest {
    pub rows: Vec<FeatureRow>,
    pub y: Vec<Option<f64>>,
    /// Layout of `rows`; `grain_columns` is empty when the grain was synthesized.
    pub schema: FrameSchema,
}

pub fn decode_request(body: &str, config: &ServiceConfig) -> Result<ScoringRequest, AppError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|e| AppError::input(format!("Invalid request JSON: {e}")))?;
    let Value::Object(mut payload) = payload else {
        return Err(AppError::input("Request body must be a JSON object with `X` and `y`."));
    };

    let x = payload
        .remove("X")
        .ok_or_else(|| AppError::input("Request is missing `X`."))?;
    let table = decode_table(x)?;

    let y = match payload.remove("y") {
        None | Some(Value::Null) => vec![None; table.len()],
        Some(v) => decode_targets(v)?,
    };
    if y.len() != table.len() {
        return Err(AppError::input(format!(
            "`y` has {} values but `X` has {} rows.",
            y.len(),
            table.len()
        )));
    }

    let grain_columns = resolve_grain_columns(&table, &config.grain_columns)?;
    let covariate_columns = resolve_covariates(&table, config, &grain_columns);

    let mut rows = Vec::with_capacity(table.len());
    for (position, row) in table.iter().enumerate() {
        rows.push(FeatureRow {
            position,
            timestamp: row_timestamp(row, &config.time_column, position)?,
            grain: row_grain(row, &grain_columns, position)?,
            covariates: covariate_columns
                .iter()
                .map(|c| lookup(row, c).cloned().unwrap_or(Value::Null))
                .collect(),
        });
    }

    Ok(ScoringRequest {
        rows,
        y,
        schema: FrameSchema {
            time_column: config.time_column.clone(),
            target_column: config.target_column.clone(),
            grain_columns,
            covariate_columns,
        },
    })
}

fn decode_table(x: Value) -> Result<Vec<Row>, AppError> {
    match x {
        Value::String(s) => {
            let inner: Value =
                serde_json::from_str(&s).map_err(|e| AppError::input(format!("`X` is not valid JSON: {e}")))?;
            if inner.is_string() {
                return Err(AppError::input("`X` must be a table, not a nested string."));
            }
            decode_table(inner)
        }
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                _ => Err(AppError::input(format!("`X` row {i} is not an object."))),
            })
            .collect(),
        Value::Object(columns) => columns_to_rows(columns),
        _ => Err(AppError::input("`X` must be an array of rows or a column-oriented object.")),
    }
}

/// Pivot `{"col": {"row": value}}` into row maps ordered by row label.
fn columns_to_rows(columns: Map<String, Value>) -> Result<Vec<Row>, AppError> {
    let mut rows: BTreeMap<RowLabel, Row> = BTreeMap::new();
    for (column, cells) in columns {
        let Value::Object(cells) = cells else {
            return Err(AppError::input(format!(
                "Column `{column}` of `X` must map row labels to values."
            )));
        };
        for (label, value) in cells {
            rows.entry(RowLabel::parse(&label))
                .or_default()
                .insert(column.clone(), value);
        }
    }
    Ok(rows.into_values().collect())
}

/// pandas row labels: numeric when they look numeric, so "10" sorts after "9".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RowLabel {
    Index(u64),
    Name(String),
}

impl RowLabel {
    fn parse(label: &str) -> Self {
        label
            .parse::<u64>()
            .map(RowLabel::Index)
            .unwrap_or_else(|_| RowLabel::Name(label.to_string()))
    }
}

fn decode_targets(v: Value) -> Result<Vec<Option<f64>>, AppError> {
    let Value::Array(items) = v else {
        return Err(AppError::input("`y` must be an array."));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64().filter(|v| v.is_finite())),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
                    return Ok(None);
                }
                s.parse::<f64>()
                    .map(|v| Some(v).filter(|v| v.is_finite()))
                    .map_err(|_| AppError::input(format!("`y[{i}]` is not a number: '{s}'.")))
            }
            _ => Err(AppError::input(format!("`y[{i}]` must be a number or null."))),
        })
        .collect()
}

/// Configured grain columns actually usable for this request.
///
/// None of them present means a single implicit grain; some but not all is an error.
fn resolve_grain_columns(table: &[Row], configured: &[String]) -> Result<Vec<String>, AppError> {
    let present: Vec<&String> = configured
        .iter()
        .filter(|g| table.iter().any(|row| lookup(row, g).is_some()))
        .collect();

    if present.is_empty() {
        return Ok(Vec::new());
    }
    if present.len() != configured.len() {
        let missing: Vec<&str> = configured
            .iter()
            .filter(|g| !present.contains(g))
            .map(String::as_str)
            .collect();
        return Err(AppError::input(format!(
            "Request carries only some grain columns; missing: {}.",
            missing.join(", ")
        )));
    }
    Ok(configured.to_vec())
}

fn resolve_covariates(table: &[Row], config: &ServiceConfig, grain_columns: &[String]) -> Vec<String> {
    if !config.covariate_columns.is_empty() {
        return config.covariate_columns.clone();
    }
    let reserved = |name: &str| {
        name.eq_ignore_ascii_case(&config.time_column)
            || name.eq_ignore_ascii_case(&config.target_column)
            || grain_columns.iter().any(|g| g.eq_ignore_ascii_case(name))
    };
    let names: BTreeSet<&String> = table
        .iter()
        .flat_map(|row| row.keys())
        .filter(|k| !reserved(k.as_str()))
        .collect();
    names.into_iter().cloned().collect()
}

fn row_timestamp(row: &Row, time_column: &str, position: usize) -> Result<Timestamp, AppError> {
    let parsed = match lookup(row, time_column) {
        None | Some(Value::Null) => Err(format!("missing `{time_column}`")),
        Some(Value::String(s)) => parse_timestamp(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(ms) => timestamp_from_epoch_millis(ms),
            None => Err(format!("`{time_column}` value {n} is not an epoch-millisecond integer")),
        },
        Some(other) => Err(format!("`{time_column}` has unsupported value {other}")),
    };
    parsed.map_err(|e| AppError::input(format!("Row {position}: {e}")))
}

fn row_grain(row: &Row, grain_columns: &[String], position: usize) -> Result<GrainKey, AppError> {
    if grain_columns.is_empty() {
        return Ok(GrainKey::single());
    }
    let mut values = Vec::with_capacity(grain_columns.len());
    for g in grain_columns {
        let v = match lookup(row, g) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => return Err(AppError::input(format!("Row {position}: missing grain value for `{g}`."))),
        };
        values.push(v);
    }
    Ok(GrainKey(values))
}

/// Exact key match first, then case-insensitive.
fn lookup<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(grains: &[&str]) -> ServiceConfig {
        ServiceConfig {
            time_column: "timeStamp".to_string(),
            target_column: "demand".to_string(),
            grain_columns: grains.iter().map(|g| g.to_string()).collect(),
            covariate_columns: Vec::new(),
            model_path: PathBuf::from("model.json"),
            max_horizon: 48,
        }
    }

    #[test]
    fn decodes_record_rows() {
        let body = r#"{
            "X": [
                {"timeStamp": "2017-02-01 00:00:00", "temp": 30.5, "precip": 0.0},
                {"timeStamp": "2017-02-01 01:00:00", "temp": 29.0, "precip": null}
            ],
            "y": [110.0, null]
        }"#;
        let req = decode_request(body, &config(&[])).unwrap();

        assert_eq!(req.rows.len(), 2);
        assert_eq!(req.y, vec![Some(110.0), None]);
        assert_eq!(req.schema.covariate_columns, vec!["precip", "temp"]);
        assert_eq!(req.rows[1].covariates, vec![Value::Null, Value::from(29.0)]);
        assert!(req.rows[0].grain.is_single());
        assert_eq!(req.rows[1].position, 1);
    }

    #[test]
    fn decodes_pandas_column_orientation_inside_a_string() {
        let x = r#"{"timeStamp":{"0":1485907200000,"1":1485910800000,"10":1485943200000,"2":1485914400000},"temp":{"0":1,"1":2,"10":11,"2":3}}"#;
        let body = serde_json::json!({ "X": x, "y": ["NaN", "NaN", "NaN", "NaN"] }).to_string();
        let req = decode_request(&body, &config(&[])).unwrap();

        let temps: Vec<Value> = req.rows.iter().map(|r| r.covariates[0].clone()).collect();
        assert_eq!(temps, vec![Value::from(1), Value::from(2), Value::from(3), Value::from(11)]);
        assert_eq!(req.rows[0].timestamp, parse_timestamp("2017-02-01 00:00").unwrap());
        assert!(req.y.iter().all(Option::is_none));
    }

    #[test]
    fn malformed_timestamp_fails_whole_request() {
        let body = r#"{"X": [{"timeStamp": "2017-02-01 00:00"}, {"timeStamp": "not-a-date"}], "y": [null, null]}"#;
        let err = decode_request(body, &config(&[])).unwrap_err();
        assert!(err.to_string().contains("Row 1"));
        assert!(err.to_string().contains("not-a-date"));
    }

    #[test]
    fn target_length_must_match() {
        let body = r#"{"X": [{"timeStamp": "2017-02-01 00:00"}], "y": [1, 2]}"#;
        assert!(decode_request(body, &config(&[])).is_err());
    }

    #[test]
    fn missing_y_means_all_unknown() {
        let body = r#"{"X": [{"timeStamp": "2017-02-01 00:00"}]}"#;
        let req = decode_request(body, &config(&[])).unwrap();
        assert_eq!(req.y, vec![None]);
    }

    #[test]
    fn grain_columns_are_used_when_present() {
        let body = r#"{"X": [{"timeStamp": "2017-02-01 00:00", "meter": "a"}, {"timeStamp": "2017-02-01 00:00", "meter": 7}], "y": [null, null]}"#;
        let req = decode_request(body, &config(&["meter"])).unwrap();
        assert_eq!(req.schema.grain_columns, vec!["meter"]);
        assert_eq!(req.rows[1].grain, GrainKey(vec!["7".to_string()]));
        assert!(req.schema.covariate_columns.is_empty());
    }

    #[test]
    fn absent_grain_columns_fall_back_to_single_grain() {
        let body = r#"{"X": [{"timeStamp": "2017-02-01 00:00"}], "y": [null]}"#;
        let req = decode_request(body, &config(&["meter"])).unwrap();
        assert!(req.schema.grain_columns.is_empty());
        assert!(req.rows[0].grain.is_single());
    }

    #[test]
    fn partial_grain_columns_are_rejected() {
        let body = r#"{"X": [{"timeStamp": "2017-02-01 00:00", "meter": "a"}], "y": [null]}"#;
        let err = decode_request(body, &config(&["meter", "site"])).unwrap_err();
        assert!(err.to_string().contains("site"));
    }

    #[test]
    fn bad_shapes_are_input_errors() {
        for body in ["[]", r#"{"y": []}"#, r#"{"X": 3}"#, r#"{"X": [1]}"#, "not json"] {
            let err = decode_request(body, &config(&[])).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{body}");
        }
    }
}
