//! Live adapter for the Replicate predictions API.
//!
//! Submits with `Prefer: wait`, so short jobs come back finished and only
//! slow ones need polling.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::RecolorError;
use crate::ports::image_provider::{
    ImageProvider, JobHandle, JobSnapshot, JobStatus, ProviderFuture, ProviderOutput,
    ProviderRequest, Submission,
};

/// Default Replicate API base URL.
pub const REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";

/// Live Replicate provider.
pub struct ReplicateProvider {
    client: Client,
    api_token: String,
    base_url: String,
}

impl ReplicateProvider {
    /// Create a provider with the given API token, base URL and per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_token: String, base_url: &str, timeout: Duration) -> Result<Self, RecolorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_token, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

impl ImageProvider for ReplicateProvider {
    fn submit(&self, request: &ProviderRequest) -> ProviderFuture<'_, Submission> {
        let request = request.clone();
        Box::pin(async move {
            let url = format!("{}/predictions", self.base_url);
            let body = serde_json::json!({
                "model": request.model,
                "input": {
                    "image": request.image,
                    "prompt": request.prompt,
                    "prompt_strength": request.params.prompt_strength,
                    "num_inference_steps": request.params.num_inference_steps,
                    "guidance_scale": request.params.guidance_scale,
                }
            });

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_token)
                .header("Prefer", "wait")
                .json(&body)
                .send()
                .await?;

            let prediction = read_prediction(response).await?;
            tracing::debug!(id = %prediction.id, status = %prediction.status, "replicate prediction created");
            prediction.into_submission()
        })
    }

    fn poll(&self, handle: &JobHandle) -> ProviderFuture<'_, JobSnapshot> {
        let handle = handle.clone();
        Box::pin(async move {
            let response =
                self.client.get(&handle.poll_url).bearer_auth(&self.api_token).send().await?;
            let prediction = read_prediction(response).await?;
            Ok(prediction.into_snapshot())
        })
    }
}

async fn read_prediction(response: reqwest::Response) -> Result<Prediction, RecolorError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), body = %truncate(&text), "replicate error response");
        return Err(RecolorError::Api { status: status.as_u16(), message: truncate(&text) });
    }

    serde_json::from_str(&text)
        .map_err(|e| RecolorError::MalformedResponse(format!("Failed to parse prediction: {e}")))
}

fn truncate(text: &str) -> String {
    if text.len() > 500 {
        let cut = (0..=500).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}

// --- Replicate API response types ---

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: String,
    #[serde(default)]
    output: Option<ProviderOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn into_snapshot(self) -> JobSnapshot {
        let error = self.error.filter(|e| !e.is_null()).map(|e| match e {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        JobSnapshot { status: JobStatus::parse(&self.status), output: self.output, error }
    }

    fn into_submission(self) -> Result<Submission, RecolorError> {
        if JobStatus::parse(&self.status).is_terminal() {
            return Ok(Submission::Completed(self.into_snapshot()));
        }
        let poll_url = self.urls.and_then(|u| u.get).ok_or_else(|| {
            RecolorError::MalformedResponse(format!(
                "prediction {} is '{}' but has no poll URL",
                self.id, self.status
            ))
        })?;
        Ok(Submission::Pending(JobHandle { id: self.id, poll_url }))
    }
}
