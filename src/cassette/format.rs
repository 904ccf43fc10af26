//! On-disk cassette format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecolorError;

/// A recorded session with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Session name.
    pub name: String,
    /// When the session was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Git commit the recording was made from.
    pub commit: String,
    /// Exchanges in the order they happened.
    pub exchanges: Vec<Exchange>,
}

/// Provider operation an exchange belongs to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// `ImageProvider::submit`.
    Submit,
    /// `ImageProvider::poll`.
    Poll,
}

/// One request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Position in the session.
    pub seq: u64,
    /// Operation.
    pub method: CallKind,
    /// What was sent, for reading the cassette; never matched on replay.
    #[serde(default)]
    pub request: serde_json::Value,
    /// `{ok: ...}` or `{err: {status, message}}`.
    pub response: serde_json::Value,
}

/// A recorded outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recorded<T> {
    /// The call succeeded.
    Ok(T),
    /// The call failed.
    Err(RecordedError),
}

/// A recorded failure, kept structured so replay classifies it like the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedError {
    /// Upstream HTTP status, if there was one.
    #[serde(default)]
    pub status: Option<u16>,
    /// Error detail.
    pub message: String,
}

impl From<&RecolorError> for RecordedError {
    fn from(err: &RecolorError) -> Self {
        Self { status: err.status(), message: err.detail() }
    }
}

impl From<RecordedError> for RecolorError {
    fn from(err: RecordedError) -> Self {
        match err.status {
            Some(status) => RecolorError::Api { status, message: err.message },
            None => RecolorError::Replay(err.message),
        }
    }
}

impl<T> Recorded<T> {
    /// Capture a live result.
    pub fn capture(result: &Result<T, RecolorError>) -> Self
    where
        T: Clone,
    {
        match result {
            Ok(v) => Self::Ok(v.clone()),
            Err(e) => Self::Err(RecordedError::from(e)),
        }
    }

    /// Turn back into the result the live call produced.
    ///
    /// # Errors
    ///
    /// Returns the recorded error.
    pub fn into_result(self) -> Result<T, RecolorError> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Err(e) => Err(e.into()),
        }
    }
}
