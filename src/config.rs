//! Configuration file loading with environment variable overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::live::gateway::GATEWAY_API_URL;
use crate::adapters::live::replicate::REPLICATE_API_BASE;
use crate::orchestrator::machine::Policy;
use crate::ports::image_provider::GenerationParams;
use crate::rate_limit::RateLimiter;
use crate::request::InputLimits;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key configuration.
    pub keys: KeysConfig,
    /// Provider selection and endpoints.
    pub provider: ProviderConfig,
    /// Sampling parameters sent with every job.
    pub generation: GenerationParams,
    /// Input validation limits.
    pub limits: LimitsConfig,
    /// Retry policy for provider calls.
    pub retry: RetryConfig,
    /// Polling policy for asynchronous jobs.
    pub polling: PollingConfig,
    /// Caller-facing rate limit.
    pub rate_limit: RateLimitConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// API key configuration.
#[derive(Debug, Default, Deserialize)]
pub struct KeysConfig {
    /// Replicate API token.
    pub replicate: Option<String>,
    /// AI gateway API key.
    pub gateway: Option<String>,
}

/// Provider selection and endpoints.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Default model name or alias.
    pub model: String,
    /// Replicate API base URL.
    pub replicate_url: String,
    /// Gateway chat completions URL.
    pub gateway_url: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: "flux-dev".to_string(),
            replicate_url: REPLICATE_API_BASE.to_string(),
            gateway_url: GATEWAY_API_URL.to_string(),
            request_timeout_secs: 90,
        }
    }
}

impl ProviderConfig {
    /// Per-request HTTP timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Input validation limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source image size in bytes.
    pub max_image_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_image_bytes: InputLimits::default().max_image_bytes }
    }
}

/// Retry policy for provider calls.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff step in milliseconds, multiplied by the attempt number.
    pub backoff_ms: u64,
    /// Fixed wait after a provider 429, in milliseconds.
    pub rate_limited_backoff_ms: u64,
    /// How many provider 429s are absorbed per call.
    pub rate_limited_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_ms: 1500, rate_limited_backoff_ms: 5000, rate_limited_retries: 1 }
    }
}

/// Polling policy for asynchronous jobs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Shortest poll interval in milliseconds.
    pub floor_ms: u64,
    /// Longest poll interval in milliseconds.
    pub ceiling_ms: u64,
    /// Hard ceiling on total wait in milliseconds.
    pub max_wait_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { floor_ms: 1000, ceiling_ms: 3000, max_wait_ms: 120_000 }
    }
}

/// Caller-facing rate limit.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Requests allowed per caller per window; 0 disables limiting.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_ms: 60_000, max_requests: 5 }
    }
}

/// HTTP server settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8787 }
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Get the Replicate API token, preferring environment variable.
    #[must_use]
    pub fn replicate_key(&self) -> Option<String> {
        std::env::var("REPLICATE_API_TOKEN").ok().or_else(|| self.keys.replicate.clone())
    }

    /// Get the AI gateway API key, preferring environment variable.
    #[must_use]
    pub fn gateway_key(&self) -> Option<String> {
        std::env::var("AI_GATEWAY_API_KEY").ok().or_else(|| self.keys.gateway.clone())
    }

    /// Validation limits.
    #[must_use]
    pub fn input_limits(&self) -> InputLimits {
        InputLimits { max_image_bytes: self.limits.max_image_bytes }
    }

    /// Retry and polling policy.
    #[must_use]
    pub fn policy(&self) -> Policy {
        Policy {
            max_attempts: self.retry.max_attempts.max(1),
            backoff_step: Duration::from_millis(self.retry.backoff_ms),
            throttle_backoff: Duration::from_millis(self.retry.rate_limited_backoff_ms),
            throttle_retries: self.retry.rate_limited_retries,
            poll_floor: Duration::from_millis(self.polling.floor_ms),
            poll_ceiling: Duration::from_millis(self.polling.ceiling_ms.max(self.polling.floor_ms)),
            max_wait: Duration::from_millis(self.polling.max_wait_ms),
        }
    }

    /// Caller-facing rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(Duration::from_millis(self.rate_limit.window_ms), self.rate_limit.max_requests)
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `RECOLOR_CONFIG` environment variable
/// 3. `~/.config/recolor/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("RECOLOR_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

/// Default config path: `~/.config/recolor/config.toml`.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/recolor/config.toml")
    } else {
        PathBuf::from("recolor.toml")
    }
}
