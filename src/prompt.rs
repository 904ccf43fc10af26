//! Instruction text sent to the image provider.

use crate::request::ValidatedRequest;

/// Build the recolor instruction for a validated request.
///
/// Only sanitized fields are interpolated.
#[must_use]
pub fn recolor_instruction(request: &ValidatedRequest) -> String {
    format!(
        "A professional interior design photo. Change ONLY the {label} to the color {name} \
         (hex: {hex}). Keep everything else exactly the same. Preserve the lighting, \
         perspective, shadows and surface texture. No text, no labels, no watermarks. \
         Realistic photograph. Do not add or remove any objects.",
        label = request.element_label,
        name = request.color_name,
        hex = request.color_hex,
    )
}
