//! Data sources: remote CSV download and synthetic demand samples.

pub mod fetch;
pub mod sample;

pub use fetch::{fetch_csv, is_remote, DatasetClient};
pub use sample::{generate_sample, SampleConfig};
