//! Replaying adapter for the `ImageProvider` port.

use std::sync::{Arc, Mutex};

use super::replay_next;
use crate::cassette::format::CallKind;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::image_provider::{
    ImageProvider, JobHandle, JobSnapshot, ProviderFuture, ProviderRequest, Submission,
};

/// Serves recorded provider responses from a cassette.
pub struct ReplayingImageProvider {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingImageProvider {
    /// Create a replaying provider backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ImageProvider for ReplayingImageProvider {
    fn submit(&self, _request: &ProviderRequest) -> ProviderFuture<'_, Submission> {
        let result = replay_next(&self.replayer, CallKind::Submit);
        Box::pin(async move { result })
    }

    fn poll(&self, _handle: &JobHandle) -> ProviderFuture<'_, JobSnapshot> {
        let result = replay_next(&self.replayer, CallKind::Poll);
        Box::pin(async move { result })
    }
}
