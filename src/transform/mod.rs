//! Built-in transformer stages.

pub mod dither;
pub mod partner_bitmap;
pub mod partner_tiny;
pub mod tiny_raster;

use crate::options::OptionBag;
use crate::plugin::StageError;

/// Parses the shared Partner spacing/mode options: `letter_spacing`
/// (alias `spacing_hint`) in 0..15, `font_mode`/`proportional`, and
/// `space_width` in 0..7 which proportional mode requires.
///
/// Returns `(proportional, letter_spacing, space_width)`; error text is
/// prefixed with the calling stage's name.
pub(crate) fn parse_partner_flags(
    options: &OptionBag,
    stage: &str,
    spacing_code: i32,
    space_width_code: i32,
    required_code: i32,
) -> Result<(bool, i32, Option<i32>), StageError> {
    let mut letter_spacing = 0;
    if let Some(raw) = options.get_non_empty("letter_spacing") {
        letter_spacing = crate::options::parse_int(raw)
            .filter(|v| (0..=15).contains(v))
            .ok_or_else(|| {
                StageError::new(spacing_code, format!("{stage}: letter_spacing must be 0..15"))
            })?;
    } else if let Some(raw) = options.get_non_empty("spacing_hint") {
        // Backward-compatible alias.
        letter_spacing = crate::options::parse_int(raw)
            .filter(|v| (0..=15).contains(v))
            .ok_or_else(|| {
                StageError::new(spacing_code, format!("{stage}: spacing_hint must be 0..15"))
            })?;
    }

    let mut proportional = false;
    if let Some(mode) = options.get_non_empty("font_mode") {
        if mode == "proportional" {
            proportional = true;
        }
        if mode == "fixed" {
            proportional = false;
        }
    }
    proportional = options.get_bool("proportional", proportional);

    let mut space_width = None;
    if let Some(raw) = options.get_non_empty("space_width") {
        let parsed = crate::options::parse_int(raw)
            .filter(|v| (0..=7).contains(v))
            .ok_or_else(|| {
                StageError::new(space_width_code, format!("{stage}: space_width must be 0..7"))
            })?;
        space_width = Some(parsed);
    }
    if proportional && space_width.is_none() {
        return Err(StageError::new(
            required_code,
            format!("{stage}: space_width is required when proportional=true"),
        ));
    }

    Ok((proportional, letter_spacing, space_width))
}
