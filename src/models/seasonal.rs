//! Seasonal-naive baseline: `ŷ(t) = y(t - season)`.
//!
//! Known targets in a query are treated as context (they pass through and
//! extend the history), unknown ones are predicted from the value one season
//! earlier. Predictions feed back into the history so horizons longer than a
//! season still resolve. A row with no value one season back is left out of
//! the raw forecast.

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{format_timestamp, ForecastSettings, GrainKey, Timestamp};
use crate::error::AppError;
use crate::models::{ForecastModel, ForecastQuery, QueryRow, RawForecast, RawForecastRow};
use crate::split::SplitPart;

/// Known actuals of one grain, sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GrainHistory {
    grain: GrainKey,
    points: Vec<(Timestamp, f64)>,
}

impl GrainHistory {
    fn get(&self, t: Timestamp) -> Option<f64> {
        self.points
            .binary_search_by_key(&t, |&(ts, _)| ts)
            .ok()
            .map(|i| self.points[i].1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalNaive {
    season_hours: i64,
    max_horizon: usize,
    grain_columns: Vec<String>,
    /// Sorted by grain for binary search.
    histories: Vec<GrainHistory>,
}

impl SeasonalNaive {
    /// Build per-grain histories from the known targets of a training part.
    pub fn fit(train: &SplitPart, settings: &ForecastSettings) -> Result<Self, AppError> {
        settings.validate()?;

        let mut by_grain: BTreeMap<&GrainKey, BTreeMap<Timestamp, f64>> = BTreeMap::new();
        let mut overwritten = 0usize;
        for (row, y) in train.rows.iter().zip(&train.target) {
            let Some(y) = *y else { continue };
            if by_grain.entry(&row.grain).or_default().insert(row.timestamp, y).is_some() {
                overwritten += 1;
            }
        }

        if by_grain.is_empty() {
            return Err(AppError::no_data("Training set has no known target values."));
        }
        if overwritten > 0 {
            tracing::warn!(rows = overwritten, "Repeated training timestamps; keeping the last value");
        }

        let histories: Vec<GrainHistory> = by_grain
            .into_iter()
            .map(|(grain, points)| GrainHistory {
                grain: grain.clone(),
                points: points.into_iter().collect(),
            })
            .collect();

        tracing::info!(
            grains = histories.len(),
            points = histories.iter().map(|h| h.points.len()).sum::<usize>(),
            season_hours = settings.season_hours,
            "Fitted seasonal-naive baseline"
        );

        Ok(Self {
            season_hours: settings.season_hours,
            max_horizon: settings.max_horizon,
            grain_columns: settings.grain_columns.clone(),
            histories,
        })
    }

    pub fn grain_columns(&self) -> &[String] {
        &self.grain_columns
    }

    /// Latest training timestamp across grains.
    pub fn trained_until(&self) -> Option<Timestamp> {
        self.histories.iter().filter_map(|h| h.points.last().map(|p| p.0)).max()
    }

    fn history(&self, grain: &GrainKey) -> Option<&GrainHistory> {
        self.histories
            .binary_search_by(|h| h.grain.cmp(grain))
            .ok()
            .map(|i| &self.histories[i])
    }

    fn forecast_grain(&self, grain: &GrainKey, rows: &[&QueryRow]) -> Vec<RawForecastRow> {
        // Loaded artifacts skip validation; an unrepresentable lag finds no history.
        let lag = chrono::TimeDelta::try_hours(self.season_hours);
        let history = self.history(grain);
        if history.is_none() {
            tracing::debug!(grain = %grain, "No training history for grain");
        }

        let label = if self.grain_columns.is_empty() { None } else { Some(grain.clone()) };
        let mut overlay: HashMap<Timestamp, f64> = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            let value = match row.y {
                Some(y) => Some(y),
                None => lag
                    .and_then(|lag| row.timestamp.checked_sub_signed(lag))
                    .and_then(|back| {
                        overlay
                            .get(&back)
                            .copied()
                            .or_else(|| history.and_then(|h| h.get(back)))
                    }),
            };
            if let Some(v) = value {
                overlay.insert(row.timestamp, v);
                out.push(RawForecastRow {
                    timestamp: row.timestamp,
                    grain: label.clone(),
                    value: v,
                });
            }
        }
        out
    }
}

impl ForecastModel for SeasonalNaive {
    fn name(&self) -> &str {
        "seasonal-naive"
    }

    fn forecast(&self, query: &ForecastQuery) -> Result<RawForecast, AppError> {
        let mut by_grain: BTreeMap<&GrainKey, Vec<&QueryRow>> = BTreeMap::new();
        let mut seen: HashSet<(Timestamp, &GrainKey)> = HashSet::with_capacity(query.len());
        for row in &query.rows {
            if !seen.insert((row.timestamp, &row.grain)) {
                return Err(AppError::input(format!(
                    "Duplicate forecast query row for ({}, {}).",
                    format_timestamp(row.timestamp),
                    row.grain
                )));
            }
            by_grain.entry(&row.grain).or_default().push(row);
        }

        for (grain, horizon) in query.horizon_by_grain() {
            if horizon > self.max_horizon {
                return Err(AppError::input(format!(
                    "Forecast horizon of {horizon} steps for grain '{grain}' exceeds the configured maximum of {}.",
                    self.max_horizon
                )));
            }
        }

        for rows in by_grain.values_mut() {
            rows.sort_by_key(|r| r.timestamp);
        }

        let per_grain: Vec<Vec<RawForecastRow>> = by_grain
            .par_iter()
            .map(|(grain, rows)| self.forecast_grain(grain, rows))
            .collect();

        Ok(RawForecast {
            rows: per_grain.into_iter().flatten().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_timestamp, FeatureRow};
    use chrono::Duration;

    fn settings(max_horizon: usize) -> ForecastSettings {
        ForecastSettings {
            time_column: "timeStamp".to_string(),
            target_column: "demand".to_string(),
            grain_columns: Vec::new(),
            cutoff: parse_timestamp("2017-01-03").unwrap(),
            max_horizon,
            season_hours: 24,
        }
    }

    fn hourly_part(start: &str, values: &[Option<f64>]) -> SplitPart {
        let t0 = parse_timestamp(start).unwrap();
        SplitPart {
            rows: (0..values.len())
                .map(|i| FeatureRow {
                    position: i,
                    timestamp: t0 + Duration::hours(i as i64),
                    grain: GrainKey::single(),
                    covariates: Vec::new(),
                })
                .collect(),
            target: values.to_vec(),
        }
    }

    fn two_days() -> SplitPart {
        let values: Vec<Option<f64>> = (0..48).map(|h| Some(100.0 + h as f64)).collect();
        hourly_part("2017-01-01 00:00", &values)
    }

    #[test]
    fn predicts_value_one_season_back() {
        let model = SeasonalNaive::fit(&two_days(), &settings(48)).unwrap();
        let test = hourly_part("2017-01-03 00:00", &[None, None, None]);
        let raw = model.forecast(&ForecastQuery::unknown(&test.rows)).unwrap();

        let values: Vec<f64> = raw.rows.iter().map(|r| r.value).collect();
        // 2017-01-02 00:00 was hour 24 -> 124.
        assert_eq!(values, vec![124.0, 125.0, 126.0]);
        assert!(raw.rows.iter().all(|r| r.grain.is_none()));
    }

    #[test]
    fn recursive_beyond_one_season() {
        let model = SeasonalNaive::fit(&two_days(), &settings(48)).unwrap();
        let test = hourly_part("2017-01-03 00:00", &vec![None; 30]);
        let raw = model.forecast(&ForecastQuery::unknown(&test.rows)).unwrap();
        assert_eq!(raw.rows.len(), 30);
        // Hour 24 of the test reuses the hour-0 prediction.
        assert_eq!(raw.rows[24].value, raw.rows[0].value);
    }

    #[test]
    fn known_targets_pass_through_and_extend_history() {
        let model = SeasonalNaive::fit(&two_days(), &settings(48)).unwrap();
        let mut values = vec![Some(500.0)];
        values.extend(vec![None; 24]);
        let test = hourly_part("2017-01-03 00:00", &values);
        let query = ForecastQuery::new(&test.rows, &test.target).unwrap();
        let raw = model.forecast(&query).unwrap();

        assert_eq!(raw.rows[0].value, 500.0);
        // 2017-01-04 00:00 looks back to the known 500.
        assert_eq!(raw.rows[24].value, 500.0);
    }

    #[test]
    fn missing_history_omits_rows() {
        let mut values: Vec<Option<f64>> = (0..48).map(|h| Some(h as f64)).collect();
        values[25] = None;
        let model = SeasonalNaive::fit(&hourly_part("2017-01-01 00:00", &values), &settings(48)).unwrap();
        let test = hourly_part("2017-01-03 00:00", &[None, None, None]);
        let raw = model.forecast(&ForecastQuery::unknown(&test.rows)).unwrap();

        let stamps: Vec<Timestamp> = raw.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![test.rows[0].timestamp, test.rows[2].timestamp]);
    }

    #[test]
    fn horizon_is_bounded() {
        let model = SeasonalNaive::fit(&two_days(), &settings(2)).unwrap();
        let test = hourly_part("2017-01-03 00:00", &[None, None, None]);
        let err = model.forecast(&ForecastQuery::unknown(&test.rows)).unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        // Context rows before the origin do not count towards the horizon.
        let test = hourly_part("2017-01-03 00:00", &[Some(1.0), Some(2.0), None, None]);
        let query = ForecastQuery::new(&test.rows, &test.target).unwrap();
        assert!(model.forecast(&query).is_ok());
    }

    #[test]
    fn output_is_grouped_by_grain_then_time() {
        let mut s = settings(48);
        s.grain_columns = vec!["meter".to_string()];
        let a = GrainKey(vec!["a".to_string()]);
        let b = GrainKey(vec!["b".to_string()]);

        let mut train = two_days();
        let mut other = two_days();
        for r in &mut other.rows {
            r.grain = b.clone();
        }
        for r in &mut train.rows {
            r.grain = a.clone();
        }
        train.rows.extend(other.rows);
        train.target.extend(other.target);
        let model = SeasonalNaive::fit(&train, &s).unwrap();

        let t0 = parse_timestamp("2017-01-03 00:00").unwrap();
        let query = ForecastQuery {
            rows: vec![
                QueryRow { timestamp: t0 + Duration::hours(1), grain: b.clone(), y: None },
                QueryRow { timestamp: t0, grain: a.clone(), y: None },
                QueryRow { timestamp: t0, grain: b.clone(), y: None },
            ],
        };
        let raw = model.forecast(&query).unwrap();
        let keys: Vec<(Timestamp, Option<GrainKey>)> =
            raw.rows.iter().map(|r| (r.timestamp, r.grain.clone())).collect();
        assert_eq!(
            keys,
            vec![
                (t0, Some(a.clone())),
                (t0, Some(b.clone())),
                (t0 + Duration::hours(1), Some(b.clone())),
            ]
        );
    }

    #[test]
    fn duplicate_query_rows_are_rejected() {
        let model = SeasonalNaive::fit(&two_days(), &settings(48)).unwrap();
        let test = hourly_part("2017-01-03 00:00", &[None]);
        let mut rows = test.rows.clone();
        rows.push(test.rows[0].clone());
        assert!(model.forecast(&ForecastQuery::unknown(&rows)).is_err());
    }

    #[test]
    fn empty_training_is_no_data() {
        let train = hourly_part("2017-01-01 00:00", &[None, None]);
        let err = SeasonalNaive::fit(&train, &settings(48)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn serde_round_trip_keeps_behavior() {
        let model = SeasonalNaive::fit(&two_days(), &settings(48)).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: SeasonalNaive = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.trained_until(), Some(parse_timestamp("2017-01-02 23:00").unwrap()));
    }

    #[test]
    fn oversized_season_from_an_artifact_does_not_panic() {
        let mut model = SeasonalNaive::fit(&two_days(), &settings(48)).unwrap();
        model.season_hours = 3_000_000_000_000;
        let test = hourly_part("2017-01-03 00:00", &[Some(7.0), None, None]);
        let query = ForecastQuery::new(&test.rows, &test.target).unwrap();
        let raw = model.forecast(&query).unwrap();
        // Only the known row comes back; the unknown ones have nothing to look up.
        assert_eq!(raw.rows.len(), 1);
        assert_eq!(raw.rows[0].value, 7.0);

        // Large but representable lags reach before the earliest timestamp.
        model.season_hours = i64::MAX / 3_600_000;
        assert!(model.forecast(&query).is_ok());
    }
}
