//! Transformer serializing the bitmap table to a Partner Bitmap stream.

use crate::codec::partner_bitmap::{serialize, PartnerBitmapError, PartnerBitmapParams};
use crate::font::{BitmapStream, Font, Payload};
use crate::options::OptionBag;
use crate::plugin::{PluginKind, PluginMeta, PluginRecord, Stage, StageError, Transform};
use crate::transform::parse_partner_flags;

pub const PLUGIN_NAME: &str = "partner_bitmap_transform";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Serializes bitmap glyphs to a Partner binary stream payload".to_string(),
            author: "snatch project".to_string(),
            format: "bitmap".to_string(),
            standard: "partner-b".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Transformer,
        },
        Stage::Transform(Box::new(PartnerBitmapTransform)),
    )
}

fn stage_error(err: PartnerBitmapError) -> StageError {
    StageError::new(err.code(), format!("{PLUGIN_NAME}: {err}"))
}

pub struct PartnerBitmapTransform;

impl Transform for PartnerBitmapTransform {
    fn transform(&self, font: &mut Font, options: &OptionBag) -> Result<(), StageError> {
        if font.bitmap.is_none() {
            return Err(stage_error(PartnerBitmapError::MissingBitmap));
        }
        if font.first_codepoint < 0
            || font.last_codepoint < font.first_codepoint
            || font.last_codepoint > 255
        {
            return Err(stage_error(PartnerBitmapError::InvalidRange));
        }

        let (proportional, letter_spacing, space_width) = parse_partner_flags(
            options,
            PLUGIN_NAME,
            PartnerBitmapError::InvalidLetterSpacing.code(),
            PartnerBitmapError::InvalidSpaceWidth.code(),
            PartnerBitmapError::SpaceWidthRequired.code(),
        )?;
        let params = PartnerBitmapParams::validate(proportional, letter_spacing, space_width)
            .map_err(stage_error)?;

        let bytes = serialize(
            font.bitmap.as_ref(),
            font.first_codepoint,
            font.last_codepoint,
            params,
        )
        .map_err(stage_error)?;

        font.payload = Payload::BitmapStream(BitmapStream { bytes });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{stride_for_bits, BitmapFont, GlyphBitmap};

    fn sample_font() -> Font {
        let mut glyph = GlyphBitmap {
            codepoint: 65,
            width: 4,
            height: 4,
            bearing_x: 0,
            bearing_y: 4,
            advance: 4,
            stride: stride_for_bits(4),
            data: vec![0; 4],
        };
        glyph.set_bit(0, 0);
        glyph.set_bit(3, 3);
        Font {
            name: "sample".to_string(),
            glyph_width: 4,
            glyph_height: 4,
            first_codepoint: 65,
            last_codepoint: 65,
            bitmap: Some(BitmapFont::new(vec![glyph])),
            ..Default::default()
        }
    }

    #[test]
    fn attaches_bitmap_stream_payload() {
        let mut font = sample_font();
        PartnerBitmapTransform
            .transform(&mut font, &OptionBag::new())
            .unwrap();
        match &font.payload {
            Payload::BitmapStream(stream) => {
                assert_eq!(stream.bytes[3], 65);
                assert_eq!(stream.bytes[4], 65);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn rejects_space_width_out_of_range() {
        let mut font = sample_font();
        let err = PartnerBitmapTransform
            .transform(&mut font, &OptionBag::parse("space_width=9"))
            .unwrap_err();
        assert_eq!(err.code, 33);
        assert!(err.message.contains("space_width must be 0..7"));
    }

    #[test]
    fn rejects_missing_bitmap() {
        let mut font = Font {
            first_codepoint: 65,
            last_codepoint: 65,
            ..Default::default()
        };
        let err = PartnerBitmapTransform
            .transform(&mut font, &OptionBag::new())
            .unwrap_err();
        assert_eq!(err.code, 30);
        assert!(err.message.contains("bitmap font data missing"));
    }

    #[test]
    fn rejects_wide_codepoint_range() {
        let mut font = sample_font();
        font.last_codepoint = 300;
        let err = PartnerBitmapTransform
            .transform(&mut font, &OptionBag::new())
            .unwrap_err();
        assert_eq!(err.code, 31);
    }
}
