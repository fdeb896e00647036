//! Transformer reconstructing bitmap glyphs from a Partner Tiny byte
//! stream held in the payload slot.

use crate::codec::partner_tiny::{decode_stream, PartnerTinyError};
use crate::font::{Font, Payload};
use crate::options::OptionBag;
use crate::plugin::{PluginKind, PluginMeta, PluginRecord, Stage, StageError, Transform};

pub const PLUGIN_NAME: &str = "partner_tiny_raster_transform";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Interprets a Partner Tiny binary stream and rebuilds bitmap glyphs"
                .to_string(),
            author: "snatch project".to_string(),
            format: "bin".to_string(),
            standard: "partner-tiny-raster".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Transformer,
        },
        Stage::Transform(Box::new(TinyRasterTransform)),
    )
}

fn stage_error(err: PartnerTinyError) -> StageError {
    StageError::new(err.code(), format!("{PLUGIN_NAME}: {err}"))
}

pub struct TinyRasterTransform;

impl Transform for TinyRasterTransform {
    fn transform(&self, font: &mut Font, _options: &OptionBag) -> Result<(), StageError> {
        let stream = match &font.payload {
            Payload::TinyStream(stream) if !stream.bytes.is_empty() => stream,
            Payload::TinyStream(_) => return Err(stage_error(PartnerTinyError::BadPayload)),
            Payload::None => {
                return Err(StageError::new(
                    30,
                    format!("{PLUGIN_NAME}: missing input payload"),
                ))
            }
            _ => return Err(stage_error(PartnerTinyError::BadPayload)),
        };

        let decoded = decode_stream(&stream.bytes).map_err(stage_error)?;

        font.glyph_width = decoded.max_width.max(1);
        font.glyph_height = decoded.max_height.max(1);
        font.first_codepoint = decoded.first_codepoint;
        font.last_codepoint = decoded.last_codepoint;
        font.pixel_size = 0;
        font.bitmap = Some(decoded.font);
        // The stream has been consumed; downstream exporters should see
        // the reconstructed table, not the stale bytes.
        font.payload = Payload::None;
        Ok(())
    }
}
