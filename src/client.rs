// HTTP client for a running `lookout serve`.
//
// Used by `lookout check` and by anything else that wants a verdict without
// loading models in-process. Every failure on this side of the wire (server
// down, timeout, bad status, unparsable body) becomes a rejecting result,
// so a caller that only reads `es_apto` can never approve by accident.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Timeout for a single request to the moderation server.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Delay between readiness polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    modelos_listos: bool,
}

/// The subset of an `/analyze` response the client cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub es_apto: bool,
    pub puntuacion_riesgo: f64,
    #[serde(default)]
    pub razones: Vec<String>,
    #[serde(default)]
    pub analisis_violencia: Option<serde_json::Value>,
    #[serde(default)]
    pub analisis_armas: Option<serde_json::Value>,
    #[serde(default)]
    pub tiempo_procesamiento: Option<f64>,
    #[serde(default)]
    pub ruta_imagen: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// A rejecting result for a request that never produced a verdict.
    pub fn fail_closed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            es_apto: false,
            puntuacion_riesgo: 1.0,
            razones: vec![error.clone()],
            analisis_violencia: None,
            analisis_armas: None,
            tiempo_procesamiento: None,
            ruta_imagen: None,
            error: Some(error),
        }
    }
}

pub struct ModerationClient {
    client: reqwest::Client,
    base_url: String,
}

impl ModerationClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Poll `/health` until the server reports its models ready.
    /// Returns false after `max_attempts` polls without readiness.
    pub async fn wait_for_ready(&self, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            match self.health().await {
                Ok(health) if health.modelos_listos => {
                    info!("Moderation server ready");
                    return true;
                }
                Ok(health) if health.status == "failed" => {
                    warn!("Moderation server failed to load any model");
                    return false;
                }
                Ok(health) => {
                    info!(status = %health.status, attempt, max_attempts, "Server initializing");
                }
                Err(e) => {
                    debug!(error = %format!("{e:#}"), attempt, max_attempts, "Server not reachable");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        warn!(max_attempts, "Timed out waiting for moderation server");
        false
    }

    async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("GET {url} returned {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse /health response")
    }

    /// Ask the server to moderate `image`. Never returns an admitting result
    /// unless the server itself admitted the image.
    pub async fn analyze(&self, image: &Path) -> AnalysisResult {
        match self.try_analyze(image).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("{e:#}");
                warn!(image = %image.display(), error = %message, "Remote analysis failed");
                AnalysisResult::fail_closed(message)
            }
        }
    }

    async fn try_analyze(&self, image: &Path) -> Result<AnalysisResult> {
        // The server resolves relative paths against its own root, so send
        // an absolute path when we can build one.
        let image_path = std::path::absolute(image).unwrap_or_else(|_| image.to_path_buf());

        let url = format!("{}/analyze", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "image_path": image_path.display().to_string() }))
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read /analyze response")?;

        if !status.is_success() {
            // Error envelopes carry their own message; fall back to the raw body.
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(body);
            anyhow::bail!("Server returned {status}: {detail}");
        }

        let result: AnalysisResult =
            serde_json::from_str(&body).context("Failed to parse /analyze response")?;
        Ok(result)
    }
}
