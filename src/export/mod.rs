//! Built-in exporter stages.

pub mod partner_asm;
pub mod partner_bitmap_asm;
pub mod png_grid;
pub mod raw_bin;
pub mod raw_c;

use std::path::Path;

use crate::codec::partner_tiny;
use crate::font::{Font, Payload};
use crate::plugin::StageError;

/// Sanitizes a string into a C/assembly identifier: non-alphanumerics
/// become `_` and a leading digit gets a `_` prefix.
pub(crate) fn sanitize_identifier(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        return fallback.to_string();
    }
    let mut out: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let leading = out.chars().next().unwrap_or('_');
    if !(leading.is_ascii_alphabetic() || leading == '_') {
        out.insert(0, '_');
    }
    out
}

/// Identifier derived from the output file's stem.
pub(crate) fn identifier_from_output(output: &Path, fallback: &str) -> String {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.is_empty() {
        fallback.to_string()
    } else {
        sanitize_identifier(&stem, fallback)
    }
}

/// Selects the byte source shared by the raw exporters: a recognized
/// stream payload is written verbatim (Tiny fonts are serialized first);
/// otherwise `None` asks the caller to fall back to raw bitmap rows.
pub(crate) fn stream_bytes_from_payload(
    font: &Font,
    stage: &str,
) -> Result<Option<Vec<u8>>, StageError> {
    match &font.payload {
        Payload::BitmapStream(stream) if !stream.bytes.is_empty() => Ok(Some(stream.bytes.clone())),
        Payload::TinyStream(stream) if !stream.bytes.is_empty() => Ok(Some(stream.bytes.clone())),
        Payload::TinyFont(tiny) => {
            let bytes = partner_tiny::serialize(
                tiny,
                font.first_codepoint,
                font.last_codepoint,
                0,
            )
            .map_err(|err| StageError::new(err.code(), format!("{stage}: {err}")))?;
            Ok(Some(bytes))
        }
        _ => Ok(None),
    }
}

/// Codepoint-range sanity check shared by the raw fallback paths.
pub(crate) fn check_raw_range(font: &Font, stage: &str, code: i32) -> Result<(), StageError> {
    if font.first_codepoint < 0
        || font.last_codepoint < font.first_codepoint
        || font.last_codepoint > 0x10FFFF
    {
        return Err(StageError::new(code, format!("{stage}: invalid codepoint range")));
    }
    Ok(())
}
