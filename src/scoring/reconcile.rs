//! Realign a raw model forecast with the rows that were asked for.
//!
//! Models answer keyed by `(timestamp, grain)` in their own order and may drop
//! rows or the grain key altogether. The reconciled output always has exactly
//! one slot per request row, ordered by the row's original position; a request
//! row with no forecast becomes `None` instead of shifting its neighbours.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::domain::{format_timestamp, FeatureRow, FrameSchema, GrainKey, Timestamp, SINGLE_GRAIN_COLUMN};
use crate::error::AppError;
use crate::models::RawForecast;

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// One entry per request row, in original row order.
    pub forecast: Vec<Option<f64>>,
    /// Aligned side table: time, grain and covariate columns per row.
    pub index: Vec<Map<String, Value>>,
    /// Request rows without a matching forecast row.
    pub missing: usize,
}

pub fn reconcile(rows: &[FeatureRow], raw: &RawForecast, schema: &FrameSchema) -> Result<Reconciled, AppError> {
    let has_grains = schema.has_grains();

    let mut ordered: Vec<&FeatureRow> = rows.iter().collect();
    ordered.sort_by_key(|r| r.position);

    // Request keys; without grain columns every row belongs to the single grain.
    let mut keys: Vec<(Timestamp, GrainKey)> = Vec::with_capacity(ordered.len());
    let mut seen: HashSet<(Timestamp, GrainKey)> = HashSet::with_capacity(ordered.len());
    for row in &ordered {
        let grain = if has_grains { row.grain.clone() } else { GrainKey::single() };
        let key = (row.timestamp, grain);
        if !seen.insert(key.clone()) {
            return Err(AppError::input(if has_grains {
                format!(
                    "Request contains more than one row for ({}, {}).",
                    format_timestamp(key.0),
                    key.1
                )
            } else {
                format!(
                    "Request contains more than one row for {} but no grain column; add one to tell the series apart.",
                    format_timestamp(key.0)
                )
            }));
        }
        keys.push(key);
    }

    let mut lookup: HashMap<(Timestamp, GrainKey), f64> = HashMap::with_capacity(raw.rows.len());
    for r in &raw.rows {
        let grain = match (&r.grain, has_grains) {
            (_, false) => GrainKey::single(),
            (Some(g), true) => g.clone(),
            (None, true) => {
                return Err(AppError::runtime(
                    "Model forecast lacks grain keys but the request carries grain columns.",
                ));
            }
        };
        if lookup.insert((r.timestamp, grain.clone()), r.value).is_some() {
            return Err(AppError::runtime(format!(
                "Model forecast contains more than one row for ({}, {grain}).",
                format_timestamp(r.timestamp)
            )));
        }
    }

    let forecast: Vec<Option<f64>> = keys.iter().map(|k| lookup.get(k).copied()).collect();
    let missing = forecast.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        tracing::warn!(missing, rows = forecast.len(), "Forecast is missing values for some request rows");
    }

    let grain_names = schema.grain_column_names();
    let index = ordered
        .iter()
        .zip(&keys)
        .map(|(row, (ts, grain))| index_row(row, *ts, grain, &grain_names, schema))
        .collect();

    Ok(Reconciled {
        forecast,
        index,
        missing,
    })
}

fn index_row(
    row: &FeatureRow,
    ts: Timestamp,
    grain: &GrainKey,
    grain_names: &[String],
    schema: &FrameSchema,
) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert(schema.time_column.clone(), Value::String(format_timestamp(ts)));
    for (name, value) in grain_names.iter().zip(grain.values()) {
        out.insert(name.clone(), Value::String(value.clone()));
    }
    for (name, value) in schema.covariate_columns.iter().zip(&row.covariates) {
        // Never let a covariate shadow the key columns.
        if name == &schema.time_column || name == SINGLE_GRAIN_COLUMN || schema.grain_columns.contains(name) {
            continue;
        }
        out.insert(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_timestamp;
    use crate::models::RawForecastRow;
    use chrono::Duration;

    fn schema(grains: &[&str]) -> FrameSchema {
        FrameSchema {
            time_column: "timeStamp".to_string(),
            target_column: "demand".to_string(),
            grain_columns: grains.iter().map(|g| g.to_string()).collect(),
            covariate_columns: vec!["temp".to_string()],
        }
    }

    fn t(h: i64) -> Timestamp {
        parse_timestamp("2017-02-01 00:00").unwrap() + Duration::hours(h)
    }

    fn rows(n: usize) -> Vec<FeatureRow> {
        (0..n)
            .map(|i| FeatureRow {
                position: i,
                timestamp: t(i as i64),
                grain: GrainKey::single(),
                covariates: vec![Value::from(i as f64)],
            })
            .collect()
    }

    fn raw(entries: &[(i64, f64)]) -> RawForecast {
        RawForecast {
            rows: entries
                .iter()
                .map(|&(h, v)| RawForecastRow { timestamp: t(h), grain: None, value: v })
                .collect(),
        }
    }

    #[test]
    fn reordered_forecast_is_realigned() {
        let out = reconcile(&rows(3), &raw(&[(2, 12.0), (0, 10.0), (1, 11.0)]), &schema(&[])).unwrap();
        assert_eq!(out.forecast, vec![Some(10.0), Some(11.0), Some(12.0)]);
        assert_eq!(out.missing, 0);
        assert_eq!(out.index.len(), 3);
        assert_eq!(out.index[1]["timeStamp"], Value::from("2017-02-01 01:00:00"));
        assert_eq!(out.index[1][SINGLE_GRAIN_COLUMN], Value::from(crate::domain::SINGLE_GRAIN_VALUE));
        assert_eq!(out.index[1]["temp"], Value::from(1.0));
    }

    #[test]
    fn omitted_timestamp_leaves_a_hole_without_shifting() {
        let out = reconcile(&rows(4), &raw(&[(0, 10.0), (3, 13.0), (1, 11.0)]), &schema(&[])).unwrap();
        assert_eq!(out.forecast, vec![Some(10.0), Some(11.0), None, Some(13.0)]);
        assert_eq!(out.missing, 1);
    }

    #[test]
    fn output_follows_original_position() {
        let mut shuffled = rows(3);
        shuffled.reverse();
        let out = reconcile(&shuffled, &raw(&[(0, 10.0), (1, 11.0), (2, 12.0)]), &schema(&[])).unwrap();
        assert_eq!(out.forecast, vec![Some(10.0), Some(11.0), Some(12.0)]);
    }

    #[test]
    fn duplicate_timestamps_without_grain_are_rejected() {
        let mut r = rows(2);
        r[1].timestamp = r[0].timestamp;
        let err = reconcile(&r, &raw(&[(0, 1.0)]), &schema(&[])).unwrap_err();
        assert!(err.to_string().contains("no grain column"));
    }

    #[test]
    fn grains_join_on_both_keys() {
        let a = GrainKey(vec!["a".to_string()]);
        let b = GrainKey(vec!["b".to_string()]);
        let mut r = rows(2);
        r[1].timestamp = r[0].timestamp;
        r[0].grain = b.clone();
        r[1].grain = a.clone();

        let forecast = RawForecast {
            rows: vec![
                RawForecastRow { timestamp: t(0), grain: Some(a.clone()), value: 1.0 },
                RawForecastRow { timestamp: t(0), grain: Some(b.clone()), value: 2.0 },
            ],
        };
        let out = reconcile(&r, &forecast, &schema(&["meter"])).unwrap();
        assert_eq!(out.forecast, vec![Some(2.0), Some(1.0)]);
        assert_eq!(out.index[0]["meter"], Value::from("b"));
    }

    #[test]
    fn grainless_forecast_for_grained_request_is_an_error() {
        let err = reconcile(&rows(1), &raw(&[(0, 1.0)]), &schema(&["meter"])).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn duplicate_forecast_rows_are_rejected() {
        assert!(reconcile(&rows(1), &raw(&[(0, 1.0), (0, 2.0)]), &schema(&[])).is_err());
    }
}
