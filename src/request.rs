//! Color application request and result types, with input validation.
//!
//! Labels and color names end up inside a natural-language instruction sent
//! to the provider, so they are cut down to a small allow-list of characters
//! before they go anywhere near a prompt.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image_ref::parse_data_uri;

/// Maximum length, in characters, of an element label or color name.
pub const MAX_LABEL_CHARS: usize = 100;

/// A request to repaint one element of a room photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorApplicationRequest {
    /// The room photo as a `data:image/...` URI.
    pub source_image: String,
    /// What to recolor, e.g. `"parede principal"`.
    pub element_label: String,
    /// Target color, `#` followed by 3, 4, 6 or 8 hex digits.
    pub target_color_hex: String,
    /// Catalog name of the color.
    #[serde(default)]
    pub color_name: Option<String>,
}

/// Size limits applied during validation.
#[derive(Debug, Clone, Copy)]
pub struct InputLimits {
    /// Maximum length of the source image URI in bytes.
    pub max_image_bytes: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self { max_image_bytes: 10_000_000 }
    }
}

/// A request that passed validation, with prompt-safe text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// The source image URI, unchanged.
    pub source_image: String,
    /// Sanitized element label.
    pub element_label: String,
    /// The validated hex color.
    pub color_hex: String,
    /// Sanitized color name, or the hex code when none was usable.
    pub color_name: String,
}

impl ColorApplicationRequest {
    /// Validate every field and sanitize the free-text ones.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first field that fails.
    pub fn validate(&self, limits: InputLimits) -> Result<ValidatedRequest, String> {
        validate_source_image(&self.source_image, limits)?;

        let label = self.element_label.trim();
        if label.is_empty() {
            return Err("Missing element label".to_string());
        }
        if label.chars().count() > MAX_LABEL_CHARS {
            return Err(format!("Element label longer than {MAX_LABEL_CHARS} characters"));
        }
        let element_label = sanitize_label(label);
        if element_label.is_empty() {
            return Err("Element label has no usable characters".to_string());
        }

        if !is_valid_hex_color(&self.target_color_hex) {
            return Err(format!(
                "Invalid color '{}' (expected hex like #RRGGBB)",
                self.target_color_hex
            ));
        }

        let color_name = self
            .color_name
            .as_deref()
            .map(sanitize_label)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.target_color_hex.clone());

        Ok(ValidatedRequest {
            source_image: self.source_image.clone(),
            element_label,
            color_hex: self.target_color_hex.clone(),
            color_name,
        })
    }
}

fn validate_source_image(image: &str, limits: InputLimits) -> Result<(), String> {
    if image.is_empty() {
        return Err("Missing image".to_string());
    }
    if image.len() > limits.max_image_bytes {
        return Err(format!("Image too large (max {} bytes)", limits.max_image_bytes));
    }
    let uri = parse_data_uri(image).ok_or_else(|| "Invalid image format".to_string())?;
    if !uri.is_known_image() {
        return Err(format!("Unsupported image type '{}'", uri.mime_type));
    }
    if uri.payload.trim().is_empty() {
        return Err("Image payload is empty".to_string());
    }
    Ok(())
}

/// Check for `#` followed by 3, 4, 6 or 8 hex digits.
#[must_use]
pub fn is_valid_hex_color(color: &str) -> bool {
    color.strip_prefix('#').is_some_and(|digits| {
        matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Truncate to [`MAX_LABEL_CHARS`] and keep only word characters, whitespace,
/// Latin-1 letters and hyphens.
#[must_use]
pub fn sanitize_label(input: &str) -> String {
    input
        .chars()
        .take(MAX_LABEL_CHARS)
        .filter(|&c| {
            c.is_ascii_alphanumeric()
                || c == '_'
                || c == '-'
                || c.is_whitespace()
                || ('\u{C0}'..='\u{FF}').contains(&c)
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Category of a failed color application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request failed validation.
    InvalidInput,
    /// The caller sent too many requests in the current window.
    RateLimited,
    /// The provider rejected or failed the job.
    ProviderFailed,
    /// The provider did not finish within the wait ceiling.
    Timeout,
    /// Every attempt failed with a transient error.
    Exhausted,
}

impl FailureKind {
    /// Stable wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::RateLimited => "rate_limited",
            Self::ProviderFailed => "provider_failed",
            Self::Timeout => "timeout",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured reason for a failed color application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub detail: String,
    /// Upstream HTTP status, when the provider returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Failure {
    /// Failure without an upstream status.
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into(), status: None }
    }

    /// Attach the upstream HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Outcome of one color application. Always carries the original image.
#[derive(Debug, Clone, Serialize)]
pub struct ColorApplicationResult {
    /// Whether a recolored image was produced.
    pub success: bool,
    /// URL or data URI of the recolored image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Why no image was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    /// The unmodified source image, for callers to fall back on.
    pub fallback_image: String,
}

impl ColorApplicationResult {
    /// Successful result.
    #[must_use]
    pub fn succeeded(image_ref: String, fallback_image: String) -> Self {
        Self { success: true, image_ref: Some(image_ref), error: None, fallback_image }
    }

    /// Failed result.
    #[must_use]
    pub fn failed(failure: Failure, fallback_image: String) -> Self {
        Self { success: false, image_ref: None, error: Some(failure), fallback_image }
    }

    /// Failure kind, if any.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|f| f.kind)
    }
}
