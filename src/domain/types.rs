//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during splitting, forecasting and reconciliation
//! - persisted as model artifacts and service configuration (JSON)
//! - echoed back to scoring clients as aligned index tables

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::time::Timestamp;
use crate::error::AppError;

/// Column name emitted when a single grain has to be synthesized.
pub const SINGLE_GRAIN_COLUMN: &str = "_grain";

/// Value carried by every row of the synthesized single grain.
pub const SINGLE_GRAIN_VALUE: &str = "_single_series";

/// Identifies which independent series a row belongs to.
///
/// One value per configured grain column, in column order. Datasets without
/// grain columns use [`GrainKey::single`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrainKey(pub Vec<String>);

impl GrainKey {
    pub fn single() -> Self {
        Self(vec![SINGLE_GRAIN_VALUE.to_string()])
    }

    pub fn is_single(&self) -> bool {
        self.0.len() == 1 && self.0[0] == SINGLE_GRAIN_VALUE
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GrainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Column layout of a loaded series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSchema {
    pub time_column: String,
    pub target_column: String,
    #[serde(default)]
    pub grain_columns: Vec<String>,
    /// Pass-through columns (e.g. `temp`, `precip`) in source order.
    #[serde(default)]
    pub covariate_columns: Vec<String>,
}

impl FrameSchema {
    pub fn has_grains(&self) -> bool {
        !self.grain_columns.is_empty()
    }

    /// Column names used for the grain part of an index table.
    ///
    /// Falls back to the synthetic single-grain column.
    pub fn grain_column_names(&self) -> Vec<String> {
        if self.has_grains() {
            self.grain_columns.clone()
        } else {
            vec![SINGLE_GRAIN_COLUMN.to_string()]
        }
    }
}

/// One observation of the series. Created at load time and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub timestamp: Timestamp,
    pub grain: GrainKey,
    /// Observed demand; `None` when the cell was empty or NaN.
    pub target: Option<f64>,
    /// Covariate cells aligned with `FrameSchema::covariate_columns`.
    pub covariates: Vec<Value>,
}

impl SeriesRecord {
    /// Strip the target, remembering where the record sat in its source.
    pub fn to_feature_row(&self, position: usize) -> FeatureRow {
        FeatureRow {
            position,
            timestamp: self.timestamp,
            grain: self.grain.clone(),
            covariates: self.covariates.clone(),
        }
    }
}

/// A loaded series: schema + records in source order.
#[derive(Debug, Clone)]
pub struct SeriesFrame {
    pub schema: FrameSchema,
    pub records: Vec<SeriesRecord>,
}

impl SeriesFrame {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest timestamp across all grains.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        time_range(self.records.iter().map(|r| r.timestamp))
    }
}

/// Feature columns of one row, detached from its target.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Row position in the sequence this row was taken from.
    pub position: usize,
    pub timestamp: Timestamp,
    pub grain: GrainKey,
    pub covariates: Vec<Value>,
}

/// Typed description of the forecasting task handed to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub time_column: String,
    pub target_column: String,
    #[serde(default)]
    pub grain_columns: Vec<String>,
    /// Exclusive split boundary: training rows are strictly before it.
    pub cutoff: Timestamp,
    /// Maximum number of unknown steps a single forecast call may cover.
    pub max_horizon: usize,
    /// Seasonal lag (hours) used by the baseline model.
    pub season_hours: i64,
}

/// Longest accepted seasonal lag: one leap year of hours.
pub const MAX_SEASON_HOURS: i64 = 366 * 24;

impl ForecastSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.time_column.trim().is_empty() || self.target_column.trim().is_empty() {
            return Err(AppError::input("Time and target column names must be non-empty."));
        }
        if self.time_column.eq_ignore_ascii_case(&self.target_column) {
            return Err(AppError::input("Time and target columns must differ."));
        }
        if self.max_horizon == 0 {
            return Err(AppError::input("Max horizon must be > 0."));
        }
        if !(1..=MAX_SEASON_HOURS).contains(&self.season_hours) {
            return Err(AppError::input(format!(
                "Season length must be between 1 and {MAX_SEASON_HOURS} hours (got {}).",
                self.season_hours
            )));
        }
        Ok(())
    }
}

/// Min/max over a timestamp iterator.
pub fn time_range(iter: impl Iterator<Item = Timestamp>) -> Option<(Timestamp, Timestamp)> {
    iter.fold(None, |acc, t| match acc {
        None => Some((t, t)),
        Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
    })
}
