//! Transformer vectorizing bitmap glyphs into Partner Tiny move streams.

use crate::codec::partner_tiny::{encode_font, PartnerTinyError};
use crate::font::{Font, Payload};
use crate::options::OptionBag;
use crate::plugin::{PluginKind, PluginMeta, PluginRecord, Stage, StageError, Transform};

pub const PLUGIN_NAME: &str = "partner_tiny_transform";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Vectorizes bitmap glyphs into a Partner Tiny move payload".to_string(),
            author: "snatch project".to_string(),
            format: "bitmap".to_string(),
            standard: "partner-tiny".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Transformer,
        },
        Stage::Transform(Box::new(PartnerTinyTransform)),
    )
}

fn stage_error(err: PartnerTinyError) -> StageError {
    StageError::new(err.code(), format!("{PLUGIN_NAME}: {err}"))
}

pub struct PartnerTinyTransform;

impl Transform for PartnerTinyTransform {
    fn transform(&self, font: &mut Font, options: &OptionBag) -> Result<(), StageError> {
        if font.bitmap.is_none() {
            return Err(stage_error(PartnerTinyError::MissingBitmap));
        }
        if font.first_codepoint < 0
            || font.last_codepoint < font.first_codepoint
            || font.last_codepoint > 255
        {
            return Err(stage_error(PartnerTinyError::InvalidRange));
        }

        let optimize = options.get_bool("optimize", true);
        let tiny = encode_font(
            font.bitmap.as_ref(),
            font.first_codepoint,
            font.last_codepoint,
            font.glyph_width,
            font.glyph_height,
            optimize,
        )
        .map_err(stage_error)?;

        font.glyph_width = i32::from(tiny.max_width_minus_one) + 1;
        font.glyph_height = i32::from(tiny.max_height_minus_one) + 1;
        font.payload = Payload::TinyFont(tiny);
        Ok(())
    }
}
