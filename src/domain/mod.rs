//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - timestamp parsing/formatting (`time`)
//! - series records, frames and grain keys (`SeriesRecord`, `SeriesFrame`, `GrainKey`)
//! - the typed forecasting task (`ForecastSettings`)

pub mod time;
pub mod types;

pub use time::*;
pub use types::*;
