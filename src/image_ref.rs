//! Image references: inline `data:` URIs and remote URLs.

use base64::Engine;

/// Image subtypes accepted after `data:image/`.
pub const IMAGE_SUBTYPES: &[&str] =
    &["png", "jpeg", "jpg", "webp", "gif", "bmp", "heic", "heif", "avif"];

/// A borrowed view of a parsed `data:` URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    /// Full MIME type, e.g. `image/png`.
    pub mime_type: &'a str,
    /// Whether the payload is base64 encoded.
    pub base64: bool,
    /// Everything after the first comma.
    pub payload: &'a str,
}

impl DataUri<'_> {
    /// True for `image/*` MIME types whose subtype we recognize.
    #[must_use]
    pub fn is_known_image(&self) -> bool {
        self.mime_type
            .strip_prefix("image/")
            .is_some_and(|sub| IMAGE_SUBTYPES.contains(&sub.to_ascii_lowercase().as_str()))
    }

    /// Decode the payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is not base64 or the payload does not decode.
    pub fn decode(&self) -> Result<Vec<u8>, String> {
        if !self.base64 {
            return Err("data URI is not base64 encoded".to_string());
        }
        base64::engine::general_purpose::STANDARD
            .decode(self.payload.trim())
            .map_err(|e| format!("Failed to decode base64: {e}"))
    }
}

/// Parse a `data:<mime>[;param...][;base64],<payload>` URI.
#[must_use]
pub fn parse_data_uri(input: &str) -> Option<DataUri<'_>> {
    let rest = input.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mut parts = header.split(';');
    let mime_type = parts.next().filter(|m| !m.is_empty())?;
    let base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));
    Some(DataUri { mime_type, base64, payload })
}

/// Build a base64 `data:` URI for the given bytes.
#[must_use]
pub fn encode_data_uri(mime_type: &str, data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{mime_type};base64,{encoded}")
}

/// True if the reference points at an `http(s)` resource.
#[must_use]
pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("https://") || reference.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_png() {
        let uri = parse_data_uri("data:image/png;base64,AAAA").unwrap();
        assert_eq!(uri.mime_type, "image/png");
        assert!(uri.base64);
        assert_eq!(uri.payload, "AAAA");
        assert!(uri.is_known_image());
    }

    #[test]
    fn rejects_missing_comma_or_prefix() {
        assert!(parse_data_uri("data:image/png;base64").is_none());
        assert!(parse_data_uri("image/png;base64,AAAA").is_none());
        assert!(parse_data_uri("data:,AAAA").is_none());
    }

    #[test]
    fn non_image_mime_is_not_known() {
        let uri = parse_data_uri("data:text/plain;base64,AAAA").unwrap();
        assert!(!uri.is_known_image());
        let uri = parse_data_uri("data:image/svg+xml;base64,AAAA").unwrap();
        assert!(!uri.is_known_image());
    }

    #[test]
    fn encode_then_decode() {
        let uri = encode_data_uri("image/jpeg", &[0xFF, 0xD8, 0xFF]);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        let parsed = parse_data_uri(&uri).unwrap();
        assert_eq!(parsed.decode().unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn plain_payload_does_not_decode() {
        let uri = parse_data_uri("data:image/png,rawbytes").unwrap();
        assert!(uri.decode().is_err());
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://replicate.delivery/out.png"));
        assert!(!is_remote("data:image/png;base64,AAAA"));
    }
}
