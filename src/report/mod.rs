//! Reporting utilities: accuracy metrics, rolling evaluation and formatted
//! terminal output.

pub mod evaluate;
pub mod format;
pub mod metrics;

pub use evaluate::{Evaluation, EvaluationRow, rolling_forecast};
pub use format::{format_metrics, format_preview, format_run_summary};
pub use metrics::{ForecastMetrics, compute_metrics};
