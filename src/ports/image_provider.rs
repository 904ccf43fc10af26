//! Image provider port for AI image-editing APIs.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::RecolorError;

/// Sampling parameters forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// How far the output may drift from the source image (0..1).
    pub prompt_strength: f32,
    /// Diffusion steps.
    pub num_inference_steps: u32,
    /// Classifier-free guidance scale.
    pub guidance_scale: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { prompt_strength: 0.55, num_inference_steps: 28, guidance_scale: 3.5 }
    }
}

/// A request to edit an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The resolved model identifier (e.g., `"asiryan/flux-dev"`).
    pub model: String,
    /// The instruction describing the edit.
    pub prompt: String,
    /// The source image as a data URI.
    pub image: String,
    /// Sampling parameters.
    pub params: GenerationParams,
}

/// Lifecycle status reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, not yet running.
    Starting,
    /// Running.
    Processing,
    /// Finished with output.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Canceled before finishing.
    Canceled,
}

impl JobStatus {
    /// Map a provider status string; anything unrecognized counts as still running.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "starting" | "queued" => Self::Starting,
            "succeeded" | "completed" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Processing,
        }
    }

    /// True once no further transition can happen.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Provider output: a single reference or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderOutput {
    /// One URL or data URI.
    Single(String),
    /// Several URLs or data URIs; the first usable one wins.
    Many(Vec<String>),
}

impl ProviderOutput {
    /// First non-empty image reference.
    #[must_use]
    pub fn first_image(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s.as_str()),
            Self::Many(list) => list.iter().map(String::as_str).find(|s| !s.trim().is_empty()),
        }
        .filter(|s| !s.trim().is_empty())
    }
}

/// Point-in-time view of a provider job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Current status.
    pub status: JobStatus,
    /// Output, present once the job succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ProviderOutput>,
    /// Provider-reported failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Snapshot of a job that succeeded with a single output.
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            output: Some(ProviderOutput::Single(output.into())),
            error: None,
        }
    }

    /// Snapshot of a job that is still running.
    #[must_use]
    pub fn pending(status: JobStatus) -> Self {
        Self { status, output: None, error: None }
    }

    /// Image reference from the output, if any.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.output.as_ref().and_then(ProviderOutput::first_image)
    }
}

/// Where to poll an asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Provider job id.
    pub id: String,
    /// URL to `GET` for status.
    pub poll_url: String,
}

/// The provider's answer to a submit, classified once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    /// The provider answered synchronously with a final state.
    Completed(JobSnapshot),
    /// The provider accepted the job; poll the handle for its outcome.
    Pending(JobHandle),
}

/// Boxed future type returned by [`ImageProvider`] methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RecolorError>> + Send + 'a>>;

/// Edits images through an external API.
pub trait ImageProvider: Send + Sync {
    /// Submit a new job.
    fn submit(&self, request: &ProviderRequest) -> ProviderFuture<'_, Submission>;

    /// Fetch the current state of an asynchronous job.
    fn poll(&self, handle: &JobHandle) -> ProviderFuture<'_, JobSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        assert_eq!(JobStatus::parse("starting"), JobStatus::Starting);
        assert_eq!(JobStatus::parse("processing"), JobStatus::Processing);
        assert_eq!(JobStatus::parse("succeeded"), JobStatus::Succeeded);
        assert_eq!(JobStatus::parse("canceled"), JobStatus::Canceled);
        assert_eq!(JobStatus::parse("something-new"), JobStatus::Processing);
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Starting.is_terminal());
    }

    #[test]
    fn output_first_image() {
        let many = ProviderOutput::Many(vec![String::new(), "https://a/1.png".into()]);
        assert_eq!(many.first_image(), Some("https://a/1.png"));
        assert_eq!(ProviderOutput::Many(vec![]).first_image(), None);
        assert_eq!(ProviderOutput::Single("  ".into()).first_image(), None);
    }

    #[test]
    fn output_accepts_string_or_list() {
        let single: JobSnapshot =
            serde_json::from_str(r#"{"status":"succeeded","output":"https://a/1.png"}"#).unwrap();
        assert_eq!(single.image(), Some("https://a/1.png"));

        let list: JobSnapshot =
            serde_json::from_str(r#"{"status":"succeeded","output":["https://a/2.png"]}"#)
                .unwrap();
        assert_eq!(list.image(), Some("https://a/2.png"));
    }

    #[test]
    fn submission_is_tagged() {
        let pending = Submission::Pending(JobHandle {
            id: "abc".into(),
            poll_url: "https://api.replicate.com/v1/predictions/abc".into(),
        });
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["kind"], "pending");
        assert_eq!(json["id"], "abc");

        let back: Submission = serde_json::from_value(json).unwrap();
        assert_eq!(back, pending);
    }
}
