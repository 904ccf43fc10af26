//! Model name resolution and provider detection.

/// Supported provider APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Replicate predictions API (may answer asynchronously).
    Replicate,
    /// OpenAI-compatible AI gateway (always synchronous).
    Gateway,
}

/// Short name aliases for the image-editing models we use.
const ALIASES: &[(&str, &str)] = &[
    ("flux-dev", "asiryan/flux-dev"),
    ("flux-kontext", "black-forest-labs/flux-kontext-pro"),
    ("nano-banana", "google/gemini-2.5-flash-image-preview"),
];

/// Model owners served through the gateway rather than Replicate.
const GATEWAY_OWNERS: &[&str] = &["google/", "openai/"];

/// Resolve a model name (alias or exact) to the full model identifier.
#[must_use]
pub fn resolve_model(name: &str) -> String {
    for &(alias, full) in ALIASES {
        if name == alias {
            return full.to_string();
        }
    }
    name.to_string()
}

/// Detect the provider from a resolved `owner/name` model id.
///
/// # Errors
///
/// Returns an error if the model id is not of the form `owner/name`.
pub fn detect_provider(model: &str) -> Result<Provider, String> {
    if GATEWAY_OWNERS.iter().any(|owner| model.starts_with(owner)) {
        return Ok(Provider::Gateway);
    }
    match model.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(Provider::Replicate),
        _ => Err(format!(
            "Unknown provider for model '{model}'. Expected an 'owner/name' id or one of: {}.",
            ALIASES.iter().map(|(a, _)| *a).collect::<Vec<_>>().join(", ")
        )),
    }
}
