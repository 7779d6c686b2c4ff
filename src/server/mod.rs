//! HTTP front-end for the scoring boundary.
//!
//! `POST /score` takes the request JSON as the raw body and always answers
//! `200` with either `{"forecast", "index"}` or `{"error"}`.
//! `GET /health` reports the loaded model.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::scoring::{ScoreResponse, ScoringContext};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub fn create_router(ctx: Arc<ScoringContext>) -> Router {
    Router::new()
        .route("/score", post(score))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn score(State(ctx): State<Arc<ScoringContext>>, body: String) -> Json<ScoreResponse> {
    // Forecasting is CPU-bound; keep it off the async workers.
    let response = tokio::task::spawn_blocking(move || ctx.score(&body))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Scoring task failed");
            ScoreResponse::Failure {
                error: format!("Scoring task failed: {e}"),
            }
        });
    Json(response)
}

async fn health(State(ctx): State<Arc<ScoringContext>>) -> Json<Value> {
    let config = ctx.config();
    Json(json!({
        "status": "ok",
        "model": ctx.model_name(),
        "time_column": config.time_column,
        "target_column": config.target_column,
        "grain_columns": config.grain_columns,
        "max_horizon": config.max_horizon,
    }))
}

/// Bind the listen address. Host names such as `localhost` are resolved.
pub async fn bind_listener(config: &ServerConfig) -> Result<TcpListener, AppError> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| AppError::runtime(format!("Failed to bind {}:{}: {e}", config.host, config.port)))
}

/// Serve until ctrl+c.
pub async fn run_server(config: ServerConfig, ctx: Arc<ScoringContext>) -> Result<(), AppError> {
    let listener = bind_listener(&config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::runtime(format!("Failed to read listen address: {e}")))?;
    tracing::info!(address = %addr, model = ctx.model_name(), "Scoring server listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl+c; serving until killed");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received, stopping server");
    };

    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::runtime(format!("Server error: {e}")))?;

    tracing::info!("Server shut down cleanly");
    Ok(())
}
