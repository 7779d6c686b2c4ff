//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic so it can be snapshot tested.
//!
//! Plot elements:
//! - actuals: `o`
//! - forecast: `*`, joined by a `-` line

use crate::domain::{Timestamp, format_timestamp};
use crate::report::EvaluationRow;

/// Plot actual vs forecast for the given rows (usually a prefix of the test part).
pub fn render_forecast_plot(rows: &[EvaluationRow], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let Some((t_min, t_max)) = crate::domain::time_range(rows.iter().map(|r| r.timestamp)) else {
        return "Plot: (no rows)\n".to_string();
    };
    let span = ((t_max - t_min).num_seconds() as f64).max(1.0);
    let x_of = |t: Timestamp| (t - t_min).num_seconds() as f64 / span;

    let values = rows.iter().flat_map(|r| [r.actual, r.predicted]).flatten();
    let (y_min, y_max) = y_range(values).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    let mut forecast: Vec<(usize, usize)> = rows
        .iter()
        .filter_map(|r| r.predicted.map(|p| (map_x(x_of(r.timestamp), width), map_y(p, y_min, y_max, height))))
        .collect();
    forecast.sort_unstable();
    for pair in forecast.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        draw_line(&mut grid, x0, y0, x1, y1, '-');
    }
    for &(x, y) in &forecast {
        grid[y][x] = '*';
    }

    // Actuals last so they stay visible where both coincide.
    for r in rows {
        if let Some(a) = r.actual {
            grid[map_y(a, y_min, y_max, height)][map_x(x_of(r.timestamp), width)] = 'o';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: time=[{}, {}] | y=[{y_min:.2}, {y_max:.2}]\n",
        format_timestamp(t_min),
        format_timestamp(t_max)
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn y_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for y in values.filter(|y| y.is_finite()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if !(min_y.is_finite() && max_y.is_finite()) {
        return None;
    }
    if max_y > min_y {
        Some((min_y, max_y))
    } else {
        Some((min_y - 0.5, max_y + 0.5))
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(u: f64, width: usize) -> usize {
    let width = width.max(2);
    (u.clamp(0.0, 1.0) * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish); only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_timestamp, GrainKey};

    fn row(t: &str, actual: Option<f64>, predicted: Option<f64>) -> EvaluationRow {
        EvaluationRow {
            position: 0,
            timestamp: parse_timestamp(t).unwrap(),
            grain: GrainKey::single(),
            actual,
            predicted,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let rows = vec![
            row("2017-02-01 00:00", Some(100.0), Some(100.0)),
            row("2017-02-01 01:00", Some(110.0), Some(100.0)),
        ];
        let txt = render_forecast_plot(&rows, 10, 5);
        let expected = concat!(
            "Plot: time=[2017-02-01 00:00:00, 2017-02-01 01:00:00] | y=[99.50, 110.50]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o--------*\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_input_renders_placeholder() {
        assert_eq!(render_forecast_plot(&[], 20, 8), "Plot: (no rows)\n");
    }

    #[test]
    fn missing_forecasts_only_show_actuals() {
        let rows = vec![
            row("2017-02-01 00:00", Some(1.0), None),
            row("2017-02-01 01:00", Some(2.0), None),
        ];
        let txt = render_forecast_plot(&rows, 12, 6);
        let body: String = txt.lines().skip(1).collect();
        assert!(!body.contains('*'));
        assert_eq!(body.matches('o').count(), 2);
    }
}
