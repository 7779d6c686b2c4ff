//! Remote dataset download (plain HTTP GET of a CSV file).

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::AppError;

const USER_AGENT: &str = concat!("demand-forecast/", env!("CARGO_PKG_VERSION"));

/// Blocking client for dataset URLs.
///
/// An optional bearer token is read from `DEMAND_DATA_TOKEN` (`.env` supported)
/// for storage endpoints that require one.
pub struct DatasetClient {
    client: Client,
    token: Option<String>,
}

impl DatasetClient {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let token = std::env::var("DEMAND_DATA_TOKEN").ok().filter(|t| !t.trim().is_empty());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::runtime(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, token })
    }

    pub fn fetch_text(&self, url: &str) -> Result<String, AppError> {
        let mut req = self.client.get(url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .map_err(|e| AppError::runtime(format!("Dataset request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "Dataset request for '{url}' failed with status {}.",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .map_err(|e| AppError::runtime(format!("Failed to read dataset body: {e}")))?;
        tracing::info!(url, bytes = body.len(), "Downloaded dataset");
        Ok(body)
    }
}

/// True for sources that must be downloaded rather than opened.
pub fn is_remote(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Download a CSV dataset as text.
pub fn fetch_csv(url: &str) -> Result<String, AppError> {
    DatasetClient::from_env()?.fetch_text(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://example.org/nyc_energy.csv"));
        assert!(is_remote("HTTP://example.org/x.csv"));
        assert!(!is_remote("data/nyc_energy.csv"));
        assert!(!is_remote("./https.csv"));
    }
}
