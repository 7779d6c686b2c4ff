//! The scoring boundary: JSON in, JSON out, never a panic or an HTTP error.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{ForecastModel, ForecastQuery};
use crate::scoring::{ServiceConfig, decode_request, reconcile};

/// Response body. Success and failure share no keys so clients can branch on
/// the presence of `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScoreResponse {
    Success {
        forecast: Vec<Option<f64>>,
        index: Vec<Map<String, Value>>,
    },
    Failure {
        error: String,
    },
}

impl ScoreResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable if a non-string map key sneaks in; keep the contract anyway.
            serde_json::json!({ "error": format!("Failed to encode response: {e}") }).to_string()
        })
    }
}

/// Loaded config plus model, shared read-only across requests.
pub struct ScoringContext {
    config: ServiceConfig,
    model: Arc<dyn ForecastModel>,
}

impl ScoringContext {
    pub fn new(config: ServiceConfig, model: Arc<dyn ForecastModel>) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self { config, model })
    }

    /// Load a service config file and the model artifact it points at.
    pub fn from_config(path: &Path) -> Result<Self, AppError> {
        let config = crate::io::read_service_config(path)?;
        let model_path = if config.model_path.is_absolute() {
            config.model_path.clone()
        } else {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&config.model_path)
        };
        let artifact = crate::io::read_model_artifact(&model_path)?;
        tracing::info!(
            config = %path.display(),
            model = %model_path.display(),
            kind = %artifact.kind,
            "Loaded scoring context"
        );
        Self::new(config, Arc::new(artifact.model))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Score one request body. Every failure, including a panic inside the
    /// model, comes back as `{"error": ...}`.
    pub fn score(&self, body: &str) -> ScoreResponse {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_score(body)));
        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::warn!(code = err.exit_code(), error = %err, "Scoring request failed");
                ScoreResponse::Failure {
                    error: err.to_string(),
                }
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%message, "Model panicked while scoring");
                ScoreResponse::Failure {
                    error: format!("Internal error while scoring: {message}"),
                }
            }
        }
    }

    fn try_score(&self, body: &str) -> Result<ScoreResponse, AppError> {
        let request = decode_request(body, &self.config)?;
        if request.rows.is_empty() {
            return Ok(ScoreResponse::Success {
                forecast: Vec::new(),
                index: Vec::new(),
            });
        }

        let query = ForecastQuery::new(&request.rows, &request.y)?;
        // The model enforces its own limit; the service may be stricter.
        for (grain, horizon) in query.horizon_by_grain() {
            if horizon > self.config.max_horizon {
                return Err(AppError::input(format!(
                    "Forecast horizon of {horizon} steps for grain '{grain}' exceeds the service maximum of {}.",
                    self.config.max_horizon
                )));
            }
        }
        let raw = self.model.forecast(&query)?;
        let reconciled = reconcile(&request.rows, &raw, &request.schema)?;
        tracing::debug!(
            rows = request.rows.len(),
            missing = reconciled.missing,
            model = self.model.name(),
            "Scored request"
        );

        Ok(ScoreResponse::Success {
            forecast: reconciled.forecast,
            index: reconciled.index,
        })
    }
}
