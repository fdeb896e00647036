//! Raw byte exporter: writes a transformer-produced stream verbatim, or
//! falls back to concatenated raw glyph rows.

use std::fs;
use std::path::Path;

use crate::export::{check_raw_range, stream_bytes_from_payload};
use crate::font::Font;
use crate::options::OptionBag;
use crate::plugin::{Export, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "raw_bin";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Exports continuous raw glyph bitmap bytes (.bin)".to_string(),
            author: "snatch project".to_string(),
            format: "bin".to_string(),
            standard: "raw-1bpp".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Exporter,
        },
        Stage::Export(Box::new(RawBinExporter)),
    )
}

/// Concatenates `height` rows of `stride` bytes per present glyph.
/// Missing glyphs contribute nothing.
pub(crate) fn raw_bitmap_bytes(font: &Font, stage: &str) -> Result<Vec<u8>, StageError> {
    let bitmap = font
        .bitmap
        .as_ref()
        .ok_or_else(|| StageError::new(10, format!("{stage}: bitmap font data missing")))?;
    check_raw_range(font, stage, 12)?;

    let mut packed = Vec::new();
    for cp in font.first_codepoint..=font.last_codepoint {
        let glyph = match bitmap.glyph(cp) {
            Some(g) if !g.data.is_empty() && g.stride > 0 => g,
            _ => continue,
        };
        for y in 0..glyph.height.max(0) {
            let start = (y * glyph.stride) as usize;
            packed.extend_from_slice(&glyph.data[start..start + glyph.stride as usize]);
        }
    }
    Ok(packed)
}

pub struct RawBinExporter;

impl Export for RawBinExporter {
    fn export(&self, font: &Font, output: &Path, _options: &OptionBag) -> Result<(), StageError> {
        if output.as_os_str().is_empty() {
            return Err(StageError::new(11, "raw_bin: output path is empty"));
        }

        let packed = match stream_bytes_from_payload(font, PLUGIN_NAME)? {
            Some(bytes) => bytes,
            None => raw_bitmap_bytes(font, PLUGIN_NAME)?,
        };

        fs::write(output, &packed)
            .map_err(|err| StageError::new(13, format!("raw_bin: cannot write output file: {err}")))
    }
}
