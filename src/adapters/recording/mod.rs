//! Recording adapters that capture provider exchanges to cassettes.

pub mod image_provider;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::cassette::format::{CallKind, Recorded};
use crate::cassette::recorder::CassetteRecorder;
use crate::error::RecolorError;

/// Record one exchange. Serialization problems are logged, never raised.
pub(crate) fn record_exchange<T, I>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    method: CallKind,
    request: &I,
    result: &Result<T, RecolorError>,
) where
    T: Serialize + Clone,
    I: Serialize,
{
    let request_json = serde_json::to_value(request).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not serialize recorded request");
        serde_json::Value::Null
    });
    let response_json = match serde_json::to_value(Recorded::capture(result)) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "skipping exchange that could not be serialized");
            return;
        }
    };

    let mut guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
    guard.record(method, request_json, response_json);
}
