//! Live adapter for an OpenAI-compatible AI gateway with image output.
//!
//! The gateway answers chat completions synchronously, so every submit is
//! [`Submission::Completed`] and polling is never needed.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::RecolorError;
use crate::ports::image_provider::{
    ImageProvider, JobHandle, JobSnapshot, JobStatus, ProviderFuture, ProviderOutput,
    ProviderRequest, Submission,
};

/// Default chat completions endpoint.
pub const GATEWAY_API_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";

/// Live gateway provider.
pub struct GatewayProvider {
    client: Client,
    api_key: String,
    url: String,
}

impl GatewayProvider {
    /// Create a provider for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: String, url: &str, timeout: Duration) -> Result<Self, RecolorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key, url: url.to_string() })
    }
}

impl ImageProvider for GatewayProvider {
    fn submit(&self, request: &ProviderRequest) -> ProviderFuture<'_, Submission> {
        let request = request.clone();
        Box::pin(async move {
            let body = serde_json::json!({
                "model": request.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": request.prompt},
                        {"type": "image_url", "image_url": {"url": request.image}}
                    ]
                }],
                "modalities": ["image", "text"]
            });

            let response =
                self.client.post(&self.url).bearer_auth(&self.api_key).json(&body).send().await?;

            let status = response.status();
            let response_text = response.text().await?;

            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "gateway error response");
                return Err(RecolorError::Api { status: status.as_u16(), message: response_text });
            }

            let parsed: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
                RecolorError::MalformedResponse(format!("Failed to parse response: {e}"))
            })?;

            Ok(Submission::Completed(parsed.into_snapshot()))
        })
    }

    fn poll(&self, handle: &JobHandle) -> ProviderFuture<'_, JobSnapshot> {
        let id = handle.id.clone();
        Box::pin(async move {
            Err(RecolorError::Unsupported(format!("gateway jobs cannot be polled (job {id})")))
        })
    }
}

// --- Chat completions response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    images: Vec<ChatImage>,
}

#[derive(Deserialize)]
struct ChatImage {
    image_url: ChatImageUrl,
}

#[derive(Deserialize)]
struct ChatImageUrl {
    url: String,
}

impl ChatResponse {
    /// A reply without images still "succeeded"; the orchestrator treats the
    /// missing output as transient.
    fn into_snapshot(self) -> JobSnapshot {
        let mut text = None;
        let mut images = Vec::new();
        for choice in self.choices {
            text = text.or(choice.message.content);
            images.extend(choice.message.images.into_iter().map(|i| i.image_url.url));
        }
        let output = (!images.is_empty()).then_some(ProviderOutput::Many(images));
        if output.is_none() {
            tracing::debug!(reply = ?text, "gateway reply carried no image");
        }
        JobSnapshot { status: JobStatus::Succeeded, output, error: None }
    }
}
