//! The seam between the pipeline and whatever produces forecasts.
//!
//! A model receives feature rows keyed by `(timestamp, grain)` together with
//! the known part of the target (`None` = to be forecast) and answers with a
//! raw forecast keyed the same way. Callers must not rely on the raw row order;
//! `scoring::reconcile` realigns it.

use std::collections::BTreeMap;

use crate::domain::{FeatureRow, GrainKey, Timestamp};
use crate::error::AppError;

/// One row of a forecast request as the model sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub timestamp: Timestamp,
    pub grain: GrainKey,
    /// Known actual (context) or `None` for a value to forecast.
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastQuery {
    pub rows: Vec<QueryRow>,
}

impl ForecastQuery {
    /// Pair feature rows with their (possibly unknown) targets.
    pub fn new(rows: &[FeatureRow], y: &[Option<f64>]) -> Result<Self, AppError> {
        if rows.len() != y.len() {
            return Err(AppError::input(format!(
                "Target length {} does not match row count {}.",
                y.len(),
                rows.len()
            )));
        }
        Ok(Self {
            rows: rows
                .iter()
                .zip(y)
                .map(|(r, &y)| QueryRow {
                    timestamp: r.timestamp,
                    grain: r.grain.clone(),
                    y,
                })
                .collect(),
        })
    }

    /// Query where every target is unknown (pure forecast).
    pub fn unknown(rows: &[FeatureRow]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|r| QueryRow {
                    timestamp: r.timestamp,
                    grain: r.grain.clone(),
                    y: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Per grain, the unknown rows after its forecast origin (the last known
    /// `y` in time order). Context rows before the origin do not count.
    pub fn horizon_by_grain(&self) -> BTreeMap<&GrainKey, usize> {
        let mut by_grain: BTreeMap<&GrainKey, Vec<&QueryRow>> = BTreeMap::new();
        for row in &self.rows {
            by_grain.entry(&row.grain).or_default().push(row);
        }
        by_grain
            .into_iter()
            .map(|(grain, mut rows)| {
                rows.sort_by_key(|r| r.timestamp);
                let start = rows.iter().rposition(|r| r.y.is_some()).map_or(0, |i| i + 1);
                (grain, rows[start..].iter().filter(|r| r.y.is_none()).count())
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawForecastRow {
    pub timestamp: Timestamp,
    /// Models trained without grain columns may leave this out.
    pub grain: Option<GrainKey>,
    pub value: f64,
}

/// Model output in model order; may be sparse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawForecast {
    pub rows: Vec<RawForecastRow>,
}

/// Anything that can turn a query into a raw forecast.
///
/// Implementations are shared read-only across concurrent scoring calls.
pub trait ForecastModel: Send + Sync {
    fn name(&self) -> &str;

    fn forecast(&self, query: &ForecastQuery) -> Result<RawForecast, AppError>;
}
