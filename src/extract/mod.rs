//! Built-in extractor stages.

pub mod image_sheet;
pub mod passthrough;
pub mod tiny_bin;
pub mod ttf;

use crate::options::OptionBag;
use crate::plugin::StageError;

/// Shared `font_mode`/`proportional` option handling: `font_mode` takes
/// precedence and must be `fixed` or `proportional` when present.
pub(crate) fn parse_proportional(
    options: &OptionBag,
    fallback: bool,
    stage: &str,
    code: i32,
) -> Result<bool, StageError> {
    if let Some(mode) = options.get_non_empty("font_mode") {
        return match mode {
            "fixed" => Ok(false),
            "proportional" => Ok(true),
            _ => Err(StageError::new(
                code,
                format!("{stage}: font_mode must be fixed|proportional"),
            )),
        };
    }
    Ok(options.get_bool("proportional", fallback))
}

/// Integer option lookup that reports unparsable values as a stage error.
pub(crate) fn parse_int_option(
    options: &OptionBag,
    key: &str,
    stage: &str,
    code: i32,
) -> Result<Option<i32>, StageError> {
    match options.get_int(key) {
        None => Ok(None),
        Some(Some(value)) => Ok(Some(value)),
        Some(None) => Err(StageError::new(
            code,
            format!("{stage}: {key} must be an integer"),
        )),
    }
}
