//! Reading source images, fetching results, file naming and format conversion.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RecolorError;
use crate::image_ref::{encode_data_uri, is_remote, parse_data_uri};

/// Read a local image file into a `data:` URI, sniffing its format.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a recognizable image.
pub fn read_source_image(path: &Path) -> Result<String, RecolorError> {
    let data = std::fs::read(path)?;
    let format = image::guess_format(&data).map_err(|e| {
        RecolorError::InvalidArgument(format!("{} is not a supported image: {e}", path.display()))
    })?;
    Ok(encode_data_uri(format.to_mime_type(), &data))
}

/// Resolve an image reference (data URI or URL) into bytes and a MIME type.
///
/// # Errors
///
/// Returns an error if the data URI is malformed or the download fails.
pub async fn load_image_ref(reference: &str) -> Result<(Vec<u8>, String), RecolorError> {
    if let Some(uri) = parse_data_uri(reference) {
        let data = uri.decode().map_err(RecolorError::ImageConversion)?;
        return Ok((data, uri.mime_type.to_string()));
    }
    if !is_remote(reference) {
        return Err(RecolorError::InvalidArgument(format!(
            "Unrecognized image reference '{}'",
            reference.chars().take(60).collect::<String>()
        )));
    }

    let response = reqwest::get(reference).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RecolorError::Api {
            status: status.as_u16(),
            message: format!("Failed to download {reference}"),
        });
    }
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .unwrap_or_default();
    let data = response.bytes().await?.to_vec();
    Ok((data, mime))
}

/// Generate an output filename from the element, color and format.
///
/// Kebab-cases the element label, appends the color digits and a unix
/// timestamp, and adds the appropriate file extension.
#[must_use]
pub fn auto_filename(element: &str, color_hex: &str, format: &str) -> String {
    let element = sanitize_for_filename(element, 40);
    let color = sanitize_for_filename(color_hex, 8);
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let ext = format_extension(format);
    format!("{element}-{color}-{timestamp}.{ext}")
}

/// Sanitize a string for use in a filename.
///
/// Converts to lowercase, replaces non-alphanumeric chars with hyphens,
/// collapses consecutive hyphens, and trims to max length.
#[must_use]
pub fn sanitize_for_filename(input: &str, max_len: usize) -> String {
    let mut result = String::with_capacity(max_len);
    let mut last_was_hyphen = true;

    for ch in input.chars() {
        if result.len() >= max_len {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            result.push('-');
            last_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.is_empty() {
        "room".to_string()
    } else {
        result
    }
}

/// Validate the output format parameter.
///
/// # Errors
///
/// Returns an error if the format is not recognized.
pub fn validate_format(format: &str) -> Result<(), String> {
    match format {
        "jpeg" | "png" | "webp" => Ok(()),
        _ => Err(format!("Unsupported format '{format}'. Valid: jpeg, png, webp")),
    }
}

/// Get the file extension for an output format.
#[must_use]
pub fn format_extension(format: &str) -> &'static str {
    match format {
        "png" => "png",
        "webp" => "webp",
        _ => "jpg",
    }
}

/// Save raw image bytes to a file, converting format if necessary.
///
/// # Errors
///
/// Returns an error if the file cannot be written or format conversion fails.
pub fn save_image(
    data: &[u8],
    source_mime: &str,
    target_format: &str,
    output_path: &Path,
) -> Result<(), RecolorError> {
    if mime_matches_format(source_mime, target_format) {
        std::fs::write(output_path, data).map_err(RecolorError::Io)
    } else {
        convert_and_save(data, target_format, output_path)
    }
}

fn mime_matches_format(mime: &str, format: &str) -> bool {
    matches!(
        (mime, format),
        ("image/jpeg" | "image/jpg", "jpeg") | ("image/png", "png") | ("image/webp", "webp")
    )
}

fn convert_and_save(
    data: &[u8],
    target_format: &str,
    output_path: &Path,
) -> Result<(), RecolorError> {
    let img = image::load_from_memory(data)
        .map_err(|e| RecolorError::ImageConversion(format!("Failed to decode image: {e}")))?;

    let image_format = match target_format {
        "jpeg" => image::ImageFormat::Jpeg,
        "png" => image::ImageFormat::Png,
        "webp" => image::ImageFormat::WebP,
        other => {
            return Err(RecolorError::ImageConversion(format!("Unsupported format: {other}")));
        }
    };

    // JPEG has no alpha channel.
    let img = if image_format == image::ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };

    img.save_with_format(output_path, image_format).map_err(|e| {
        RecolorError::ImageConversion(format!("Failed to save as {target_format}: {e}"))
    })
}

/// Resolve the output path: use explicit path or auto-generate.
#[must_use]
pub fn resolve_output_path(
    explicit: Option<&str>,
    element: &str,
    color_hex: &str,
    format: &str,
) -> PathBuf {
    match explicit {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(auto_filename(element, color_hex, format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[test]
    fn sanitize_basic() {
        assert_eq!(sanitize_for_filename("Parede Principal", 50), "parede-principal");
    }

    #[test]
    fn sanitize_drops_accents_and_symbols() {
        assert_eq!(sanitize_for_filename("Teto (sala de estar)!", 50), "teto-sala-de-estar");
        assert_eq!(sanitize_for_filename("#A1B2C3", 8), "a1b2c3");
    }

    #[test]
    fn sanitize_truncates() {
        let result = sanitize_for_filename(&"a".repeat(100), 10);
        assert!(result.len() <= 10);
    }

    #[test]
    fn sanitize_empty() {
        assert_eq!(sanitize_for_filename("", 50), "room");
        assert_eq!(sanitize_for_filename("!!!", 50), "room");
    }

    #[test]
    fn auto_filename_format() {
        let name = auto_filename("parede principal", "#C0FFEE", "jpeg");
        assert!(name.starts_with("parede-principal-c0ffee-"));
        assert_eq!(Path::new(&name).extension().unwrap(), "jpg");
    }

    #[test]
    fn resolve_explicit() {
        let path = resolve_output_path(Some("out.png"), "ignored", "#fff", "jpeg");
        assert_eq!(path, PathBuf::from("out.png"));
    }

    #[test]
    fn format_validation() {
        assert!(validate_format("png").is_ok());
        assert!(validate_format("gif").is_err());
        assert_eq!(format_extension("webp"), "webp");
    }

    #[test]
    fn mime_matches() {
        assert!(mime_matches_format("image/jpeg", "jpeg"));
        assert!(mime_matches_format("image/png", "png"));
        assert!(!mime_matches_format("image/png", "jpeg"));
    }

    #[test]
    fn read_source_image_sniffs_png() {
        use base64::Engine;
        let dir = std::env::temp_dir().join("recolor_read_source_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("room.bin");
        let bytes = base64::engine::general_purpose::STANDARD.decode(PNG_1X1).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let uri = read_source_image(&path).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        std::fs::write(&path, b"not an image").unwrap();
        assert!(read_source_image(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn load_inline_reference() {
        let (data, mime) = load_image_ref(&format!("data:image/png;base64,{PNG_1X1}")).await.unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(&data[1..4], b"PNG");
        assert!(load_image_ref("ftp://nope").await.is_err());
    }

    #[test]
    fn converts_png_to_jpeg() {
        use base64::Engine;
        let dir = std::env::temp_dir().join("recolor_convert_test");
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("out.jpg");
        let png = base64::engine::general_purpose::STANDARD.decode(PNG_1X1).unwrap();

        save_image(&png, "image/png", "jpeg", &out).unwrap();
        let written = std::fs::read(&out).unwrap();
        assert_eq!(&written[..2], &[0xFF, 0xD8]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
