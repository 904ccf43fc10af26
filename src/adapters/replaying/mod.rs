//! Replaying adapters that serve recorded exchanges from cassettes.

pub mod image_provider;

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;

use crate::cassette::format::{CallKind, Recorded};
use crate::cassette::replayer::CassetteReplayer;
use crate::error::RecolorError;

/// Pop the next recorded response for `method` and turn it back into a result.
pub(crate) fn replay_next<T: DeserializeOwned>(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    method: CallKind,
) -> Result<T, RecolorError> {
    let exchange = replayer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next_exchange(method)
        .map_err(RecolorError::Replay)?;
    let recorded: Recorded<T> = serde_json::from_value(exchange.response).map_err(|e| {
        RecolorError::Replay(format!("exchange {} is not a valid response: {e}", exchange.seq))
    })?;
    recorded.into_result()
}
