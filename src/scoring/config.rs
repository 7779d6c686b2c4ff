//! Typed configuration handed to the scoring service.
//!
//! Written next to the model artifact at registration time and read back by
//! `score`/`serve`. Column names travel as data, never as text spliced into
//! generated files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{ForecastSettings, FrameSchema};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub time_column: String,
    pub target_column: String,
    #[serde(default)]
    pub grain_columns: Vec<String>,
    /// Columns echoed back in the `index` table. Empty = echo whatever the request carries.
    #[serde(default)]
    pub covariate_columns: Vec<String>,
    /// Model artifact, relative paths resolve against the config file's directory.
    pub model_path: PathBuf,
    pub max_horizon: usize,
}

impl ServiceConfig {
    pub fn from_parts(schema: &FrameSchema, settings: &ForecastSettings, model_path: PathBuf) -> Self {
        Self {
            time_column: schema.time_column.clone(),
            target_column: schema.target_column.clone(),
            grain_columns: schema.grain_columns.clone(),
            covariate_columns: schema.covariate_columns.clone(),
            model_path,
            max_horizon: settings.max_horizon,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.time_column.trim().is_empty() || self.target_column.trim().is_empty() {
            return Err(AppError::input("Service config: time and target column names must be non-empty."));
        }
        if self.grain_columns.iter().any(|g| g == &self.time_column) {
            return Err(AppError::input("Service config: the time column cannot also be a grain column."));
        }
        if self.max_horizon == 0 {
            return Err(AppError::input("Service config: max_horizon must be > 0."));
        }
        Ok(())
    }
}
