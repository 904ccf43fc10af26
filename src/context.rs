//! Service context that picks the provider implementation for this run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::adapters::live::gateway::GatewayProvider;
use crate::adapters::live::replicate::ReplicateProvider;
use crate::adapters::recording::image_provider::RecordingImageProvider;
use crate::adapters::replaying::image_provider::ReplayingImageProvider;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::Config;
use crate::error::RecolorError;
use crate::model::Provider;
use crate::ports::ImageProvider;

/// Environment variable naming a cassette to replay.
pub const REPLAY_ENV: &str = "RECOLOR_REPLAY";
/// Environment variable that turns on recording.
pub const RECORD_ENV: &str = "RECOLOR_REC";

/// Bundles the port trait objects for one run.
pub struct ServiceContext {
    /// Image provider port.
    pub provider: Arc<dyn ImageProvider>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Write the recorded cassette to disk.
    ///
    /// The provider may still hold a reference (the server shares it across
    /// requests), so the recorder is drained rather than unwrapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let recorder = {
            let mut guard = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, CassetteRecorder::new("", "", ""))
        };
        tracing::debug!(exchanges = recorder.len(), "writing cassette");
        recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Pick live, recording or replaying mode from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen mode cannot be initialized.
    pub fn from_env(
        provider: Provider,
        config: &Config,
    ) -> Result<(Self, Option<RecordingSession>), RecolorError> {
        let replay_path = std::env::var(REPLAY_ENV).ok();
        let is_recording = std::env::var(RECORD_ENV).is_ok_and(|v| v == "true" || v == "1");

        if let Some(ref cassette_path) = replay_path {
            tracing::info!(cassette = %cassette_path, "replaying provider exchanges");
            Ok((Self::replaying(Path::new(cassette_path))?, None))
        } else if is_recording {
            tracing::info!("recording provider exchanges");
            let (ctx, session) = Self::recording(provider, config)?;
            Ok((ctx, Some(session)))
        } else {
            Ok((Self::live(provider, config)?, None))
        }
    }

    /// Create a live context for the given provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not configured.
    pub fn live(provider: Provider, config: &Config) -> Result<Self, RecolorError> {
        let timeout = config.provider.request_timeout();
        let provider: Arc<dyn ImageProvider> = match provider {
            Provider::Replicate => {
                let key = config.replicate_key().ok_or(RecolorError::MissingApiKey {
                    provider: "Replicate".into(),
                    env_var: "REPLICATE_API_TOKEN".into(),
                })?;
                Arc::new(ReplicateProvider::new(key, &config.provider.replicate_url, timeout)?)
            }
            Provider::Gateway => {
                let key = config.gateway_key().ok_or(RecolorError::MissingApiKey {
                    provider: "AI gateway".into(),
                    env_var: "AI_GATEWAY_API_KEY".into(),
                })?;
                Arc::new(GatewayProvider::new(key, &config.provider.gateway_url, timeout)?)
            }
        };
        Ok(Self { provider })
    }

    /// Create a recording context that wraps a live adapter with a recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the live adapter cannot be initialized.
    pub fn recording(
        provider: Provider,
        config: &Config,
    ) -> Result<(Self, RecordingSession), RecolorError> {
        let live_ctx = Self::live(provider, config)?;

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = PathBuf::from(".recolor/cassettes")
            .join(&timestamp)
            .join("image_provider.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
            path,
            format!("{timestamp}-image_provider"),
            get_commit_hash(),
        )));

        let provider = RecordingImageProvider::new(live_ctx.provider, Arc::clone(&recorder));
        Ok((Self { provider: Arc::new(provider) }, RecordingSession { recorder }))
    }

    /// Create a replaying context from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, RecolorError> {
        let replayer = load_cassette(path)
            .map_err(|e| RecolorError::Config(format!("Failed to load cassette: {e}")))?;
        let provider = ReplayingImageProvider::new(Arc::new(Mutex::new(replayer)));
        Ok(Self { provider: Arc::new(provider) })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}
