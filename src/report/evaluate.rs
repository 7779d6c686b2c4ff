//! Rolling-origin evaluation of a model over the test part.
//!
//! Each grain's test timestamps are cut into windows of at most `max_horizon`
//! steps. Window `k` is forecast with the actuals of windows `0..k` as known
//! context, reconciled against the window rows, and written back by position.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{FeatureRow, FrameSchema, GrainKey, Timestamp};
use crate::error::AppError;
use crate::models::{ForecastModel, ForecastQuery, QueryRow};
use crate::report::metrics::{ForecastMetrics, compute_metrics};
use crate::scoring::reconcile;
use crate::split::SplitPart;

/// One test row with its actual and the stitched forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRow {
    pub position: usize,
    pub timestamp: Timestamp,
    pub grain: GrainKey,
    pub actual: Option<f64>,
    pub predicted: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Test rows in test-part order.
    pub rows: Vec<EvaluationRow>,
    pub windows: usize,
    pub metrics: ForecastMetrics,
}

/// One distinct `(timestamp, grain)` in the test part.
struct KeySlot<'a> {
    row: &'a FeatureRow,
    /// Last known actual among rows sharing the key.
    actual: Option<f64>,
}

pub fn rolling_forecast(
    model: &dyn ForecastModel,
    test: &SplitPart,
    schema: &FrameSchema,
    max_horizon: usize,
) -> Result<Evaluation, AppError> {
    if max_horizon == 0 {
        return Err(AppError::input("max_horizon must be > 0."));
    }

    // Per grain, distinct timestamps in time order.
    let mut by_grain: BTreeMap<&GrainKey, BTreeMap<Timestamp, KeySlot<'_>>> = BTreeMap::new();
    for (row, y) in test.rows.iter().zip(&test.target) {
        let slot = by_grain
            .entry(&row.grain)
            .or_default()
            .entry(row.timestamp)
            .or_insert(KeySlot { row, actual: None });
        if y.is_some() {
            slot.actual = *y;
        }
    }

    let grains: Vec<Vec<&KeySlot<'_>>> = by_grain.values().map(|m| m.values().collect()).collect();
    let windows = grains
        .iter()
        .map(|slots| slots.len().div_ceil(max_horizon))
        .max()
        .unwrap_or(0);

    let mut predicted: HashMap<(Timestamp, &GrainKey), Option<f64>> = HashMap::with_capacity(test.len());
    for k in 0..windows {
        let mut query = ForecastQuery::default();
        let mut targets: Vec<FeatureRow> = Vec::new();

        for slots in &grains {
            let start = k * max_horizon;
            if start >= slots.len() {
                continue;
            }
            let end = (start + max_horizon).min(slots.len());
            for slot in &slots[..start] {
                // Unknown context would count against the horizon.
                if let Some(y) = slot.actual {
                    query.rows.push(QueryRow {
                        timestamp: slot.row.timestamp,
                        grain: slot.row.grain.clone(),
                        y: Some(y),
                    });
                }
            }
            for slot in &slots[start..end] {
                query.rows.push(QueryRow {
                    timestamp: slot.row.timestamp,
                    grain: slot.row.grain.clone(),
                    y: None,
                });
                targets.push(slot.row.clone());
            }
        }

        let raw = model.forecast(&query)?;
        let reconciled = reconcile(&targets, &raw, schema)?;
        // `reconcile` answers in position order.
        targets.sort_by_key(|r| r.position);
        for (row, value) in targets.iter().zip(reconciled.forecast) {
            let grain = by_grain
                .get_key_value(&row.grain)
                .map(|(g, _)| *g)
                .ok_or_else(|| AppError::runtime("Evaluation lost track of a grain."))?;
            predicted.insert((row.timestamp, grain), value);
        }
        tracing::debug!(window = k, rows = targets.len(), missing = reconciled.missing, "Forecast window");
    }

    let rows: Vec<EvaluationRow> = test
        .rows
        .iter()
        .zip(&test.target)
        .map(|(row, &actual)| EvaluationRow {
            position: row.position,
            timestamp: row.timestamp,
            grain: row.grain.clone(),
            actual,
            predicted: predicted.get(&(row.timestamp, &row.grain)).copied().flatten(),
        })
        .collect();

    let metrics = compute_metrics(rows.iter().map(|r| (r.actual, r.predicted)));
    tracing::info!(
        rows = rows.len(),
        windows,
        scored = metrics.count,
        missing = metrics.missing,
        "Rolling evaluation finished"
    );

    Ok(Evaluation { rows, windows, metrics })
}
