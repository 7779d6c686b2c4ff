//! Terminal plots.

pub mod ascii;

pub use ascii::render_forecast_plot;
