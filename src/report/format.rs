//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline stays free of presentation details.

use crate::domain::{ForecastSettings, format_timestamp};
use crate::io::ingest::IngestedData;
use crate::report::evaluate::{Evaluation, EvaluationRow};
use crate::report::metrics::ForecastMetrics;
use crate::split::TemporalSplit;

/// Dataset + split + model header for a `demand fit` run.
pub fn format_run_summary(
    ingest: &IngestedData,
    split: &TemporalSplit,
    settings: &ForecastSettings,
    model_name: &str,
) -> String {
    let mut out = String::new();
    let stats = &ingest.stats;

    out.push_str("=== demand - Energy Demand Forecast ===\n");
    out.push_str(&format!(
        "Columns: time={} | target={} | grain={}\n",
        settings.time_column,
        settings.target_column,
        if settings.grain_columns.is_empty() {
            "(none)".to_string()
        } else {
            settings.grain_columns.join(",")
        }
    ));
    out.push_str(&format!(
        "Rows: read={} | used={} | skipped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    out.push_str(&format!(
        "Records: n={} | grains={} | time=[{}, {}]\n",
        stats.n_records,
        stats.n_grains,
        format_timestamp(stats.time_min),
        format_timestamp(stats.time_max)
    ));
    if let Some((lo, hi)) = stats.target_range {
        out.push_str(&format!("Target: [{lo:.2}, {hi:.2}] | missing={}\n", stats.missing_targets));
    } else {
        out.push_str(&format!("Target: (all missing) | missing={}\n", stats.missing_targets));
    }
    if stats.out_of_order > 0 || stats.duplicate_keys > 0 {
        out.push_str(&format!(
            "Warnings: out-of-order={} | duplicate keys={}\n",
            stats.out_of_order, stats.duplicate_keys
        ));
    }

    out.push('\n');
    out.push_str(&split.summary());

    out.push_str(&format!(
        "\nModel: {model_name} | season={}h | max horizon={}\n",
        settings.season_hours, settings.max_horizon
    ));
    out
}

pub fn format_metrics(eval: &Evaluation) -> String {
    let m: &ForecastMetrics = &eval.metrics;
    let mut out = String::new();
    out.push_str(&format!(
        "Evaluation: rolling origin | windows={} | scored={} | missing forecast={}\n",
        eval.windows, m.count, m.missing
    ));
    out.push_str(&format!("  RMSE : {}\n", fmt_opt(m.rmse, "")));
    out.push_str(&format!("  MAE  : {}\n", fmt_opt(m.mae, "")));
    out.push_str(&format!("  MAPE : {}\n", fmt_opt(m.mape, "%")));
    out
}

/// First `n` evaluation rows as a table.
pub fn format_preview(rows: &[EvaluationRow], n: usize, show_grain: bool) -> String {
    let mut out = String::new();
    out.push_str(
        format!("{:<19} {:<16} {:>12} {:>12} {:>12}", "time", "grain", "actual", "forecast", "error").trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<19} {:-<16} {:-<12} {:-<12} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows.iter().take(n) {
        let grain = if show_grain { r.grain.to_string() } else { String::new() };
        let err = match (r.actual, r.predicted) {
            (Some(a), Some(p)) => Some(a - p),
            _ => None,
        };
        out.push_str(
            format!(
                "{:<19} {:<16} {:>12} {:>12} {:>12}",
                format_timestamp(r.timestamp),
                truncate(&grain, 16),
                fmt_cell(r.actual),
                fmt_cell(r.predicted),
                fmt_cell(err),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    v.map(|x| format!("{x:.4}{unit}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
