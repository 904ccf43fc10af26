//! Recording adapter for the `ImageProvider` port.

use std::sync::{Arc, Mutex};

use super::record_exchange;
use crate::cassette::format::CallKind;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::image_provider::{
    ImageProvider, JobHandle, JobSnapshot, ProviderFuture, ProviderRequest, Submission,
};

/// Records provider exchanges while delegating to an inner provider.
pub struct RecordingImageProvider {
    inner: Arc<dyn ImageProvider>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingImageProvider {
    /// Wrap `inner`, recording into `recorder`.
    pub fn new(inner: Arc<dyn ImageProvider>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ImageProvider for RecordingImageProvider {
    fn submit(&self, request: &ProviderRequest) -> ProviderFuture<'_, Submission> {
        let request = request.clone();
        Box::pin(async move {
            let result = self.inner.submit(&request).await;
            // The source image can be megabytes; keep the cassette readable.
            let summary = serde_json::json!({
                "model": request.model,
                "prompt": request.prompt,
                "image_bytes": request.image.len(),
                "params": request.params,
            });
            record_exchange(&self.recorder, CallKind::Submit, &summary, &result);
            result
        })
    }

    fn poll(&self, handle: &JobHandle) -> ProviderFuture<'_, JobSnapshot> {
        let handle = handle.clone();
        Box::pin(async move {
            let result = self.inner.poll(&handle).await;
            record_exchange(&self.recorder, CallKind::Poll, &handle, &result);
            result
        })
    }
}
