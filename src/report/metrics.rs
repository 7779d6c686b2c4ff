//! Point-forecast accuracy metrics.

/// Actuals with absolute value at or below this are left out of MAPE.
pub const MAPE_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastMetrics {
    /// Pairs where both the actual and the forecast exist.
    pub count: usize,
    /// Rows with a known actual but no forecast.
    pub missing: usize,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    /// Percent.
    pub mape: Option<f64>,
}

/// Score `(actual, predicted)` pairs; a pair with either side missing does not count.
pub fn compute_metrics(pairs: impl IntoIterator<Item = (Option<f64>, Option<f64>)>) -> ForecastMetrics {
    let mut count = 0usize;
    let mut missing = 0usize;
    let mut sq = 0.0;
    let mut abs = 0.0;
    let mut pct = 0.0;
    let mut pct_n = 0usize;

    for (actual, predicted) in pairs {
        let (a, p) = match (actual, predicted) {
            (Some(a), Some(p)) if a.is_finite() && p.is_finite() => (a, p),
            (Some(a), None) if a.is_finite() => {
                missing += 1;
                continue;
            }
            _ => continue,
        };
        let err = a - p;
        count += 1;
        sq += err * err;
        abs += err.abs();
        if a.abs() > MAPE_EPSILON {
            pct += (err / a).abs();
            pct_n += 1;
        }
    }

    if count == 0 {
        return ForecastMetrics {
            missing,
            ..ForecastMetrics::default()
        };
    }

    let n = count as f64;
    ForecastMetrics {
        count,
        missing,
        rmse: Some((sq / n).sqrt()),
        mae: Some(abs / n),
        mape: (pct_n > 0).then(|| 100.0 * pct / pct_n as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_errors() {
        let m = compute_metrics(vec![(Some(10.0), Some(12.0)), (Some(20.0), Some(18.0))]);
        assert_eq!(m.count, 2);
        assert!((m.rmse.unwrap() - 2.0).abs() < 1e-12);
        assert!((m.mae.unwrap() - 2.0).abs() < 1e-12);
        // (0.2 + 0.1) / 2 = 15%
        assert!((m.mape.unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn missing_sides_are_skipped() {
        let m = compute_metrics(vec![(Some(10.0), None), (None, Some(3.0)), (Some(4.0), Some(4.0))]);
        assert_eq!(m.count, 1);
        assert_eq!(m.missing, 1);
        assert_eq!(m.rmse, Some(0.0));
    }

    #[test]
    fn zero_actuals_do_not_enter_mape() {
        let m = compute_metrics(vec![(Some(0.0), Some(1.0)), (Some(2.0), Some(1.0))]);
        assert_eq!(m.count, 2);
        assert!((m.mape.unwrap() - 50.0).abs() < 1e-9);

        let only_zero = compute_metrics(vec![(Some(0.0), Some(1.0))]);
        assert_eq!(only_zero.mape, None);
        assert_eq!(only_zero.mae, Some(1.0));
    }

    #[test]
    fn empty_input_has_no_scores() {
        let m = compute_metrics(Vec::new());
        assert_eq!(m, ForecastMetrics::default());
    }
}
