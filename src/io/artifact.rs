//! Read/write the two files a trained run leaves behind.
//!
//! - the model artifact: the fitted `SeasonalNaive` plus provenance
//! - the service config: the columns and horizon the scoring side needs
//!
//! Both are plain JSON so they can be inspected and diffed by hand.

use std::fs::File;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::SeasonalNaive;
use crate::scoring::ServiceConfig;

pub const ARTIFACT_TOOL: &str = "demand";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub tool: String,
    pub kind: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub model: SeasonalNaive,
}

impl ModelArtifact {
    pub fn new(model: SeasonalNaive) -> Self {
        Self {
            tool: ARTIFACT_TOOL.to_string(),
            kind: "seasonal_naive".to_string(),
            created_at: Utc::now().to_rfc3339(),
            model,
        }
    }
}

pub fn write_model_artifact(path: &Path, model: &SeasonalNaive) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::runtime(format!("Failed to create model artifact '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &ModelArtifact::new(model.clone()))
        .map_err(|e| AppError::runtime(format!("Failed to write model artifact: {e}")))?;
    tracing::info!(path = %path.display(), "Wrote model artifact");
    Ok(())
}

pub fn read_model_artifact(path: &Path) -> Result<ModelArtifact, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open model artifact '{}': {e}", path.display())))?;
    let artifact: ModelArtifact =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid model artifact: {e}")))?;
    if artifact.tool != ARTIFACT_TOOL {
        return Err(AppError::input(format!(
            "Model artifact '{}' was written by '{}', not '{ARTIFACT_TOOL}'.",
            path.display(),
            artifact.tool
        )));
    }
    Ok(artifact)
}

pub fn write_service_config(path: &Path, config: &ServiceConfig) -> Result<(), AppError> {
    config.validate()?;
    let file = File::create(path)
        .map_err(|e| AppError::runtime(format!("Failed to create service config '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| AppError::runtime(format!("Failed to write service config: {e}")))?;
    tracing::info!(path = %path.display(), "Wrote service config");
    Ok(())
}

pub fn read_service_config(path: &Path) -> Result<ServiceConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open service config '{}': {e}", path.display())))?;
    let config: ServiceConfig =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid service config: {e}")))?;
    config.validate()?;
    Ok(config)
}
