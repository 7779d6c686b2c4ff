//! Forecast models.
//!
//! `model` holds the `ForecastModel` trait and the query/raw-forecast types;
//! `seasonal` is the built-in seasonal-naive baseline.

pub mod model;
pub mod seasonal;

pub use model::*;
pub use seasonal::SeasonalNaive;
