//! Unified error type for recolor.

use thiserror::Error;

use crate::request::Failure;

/// Errors that can occur below the orchestrator boundary.
#[derive(Debug, Error)]
pub enum RecolorError {
    /// A provider API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message or body from the API.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a body we could not make sense of.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Image format conversion error.
    #[error("Image conversion error: {0}")]
    ImageConversion(String),

    /// No API key configured for the provider.
    #[error("No API key for {provider}. Set {env_var} or add it to config file.")]
    MissingApiKey {
        /// The provider name.
        provider: String,
        /// The environment variable name.
        env_var: String,
    },

    /// A replayed interaction failed without an HTTP status, or the cassette ran dry.
    #[error("Replay error: {0}")]
    Replay(String),

    /// The provider does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Color application finished without an image.
    #[error("{0}")]
    Failed(Failure),
}

/// How the retry loop should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Expected to clear up on another attempt.
    Transient,
    /// The provider asked us to slow down.
    Throttled,
    /// Retrying cannot help.
    Fatal,
}

impl RecolorError {
    /// Upstream HTTP status, when the error came from an HTTP response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The message without the variant prefix, as recorded in cassettes.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::MalformedResponse(m) | Self::Replay(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Classify the error for the retry loop.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Api { status: 429, .. } => Disposition::Throttled,
            Self::Api { status, .. } if *status >= 500 => Disposition::Transient,
            Self::Network(e) => match e.status() {
                Some(s) if s.as_u16() == 429 => Disposition::Throttled,
                Some(s) if s.is_client_error() => Disposition::Fatal,
                _ => Disposition::Transient,
            },
            Self::MalformedResponse(_) | Self::Replay(_) => Disposition::Transient,
            _ => Disposition::Fatal,
        }
    }
}
