//! Floyd-Steinberg dither: quantizes a grayscale passthrough image into a
//! single 1bpp glyph covering the whole frame.

use crate::font::{stride_for_bits, BitmapFont, Font, GlyphBitmap, Payload};
use crate::options::OptionBag;
use crate::plugin::{PluginKind, PluginMeta, PluginRecord, Stage, StageError, Transform};

pub const PLUGIN_NAME: &str = "dither_1bpp_transform";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Converts a grayscale passthrough image to 1bpp with Floyd-Steinberg dithering".to_string(),
            author: "snatch project".to_string(),
            format: "bitmap".to_string(),
            standard: "dither-1bpp".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Transformer,
        },
        Stage::Transform(Box::new(DitherTransform)),
    )
}

fn parse_threshold(options: &OptionBag) -> Result<i32, StageError> {
    match options.get_non_empty("threshold") {
        None => Ok(128),
        Some(raw) => crate::options::parse_int(raw)
            .filter(|v| (0..=255).contains(v))
            .ok_or_else(|| {
                StageError::new(13, format!("{PLUGIN_NAME}: threshold must be 0..255"))
            }),
    }
}

pub struct DitherTransform;

impl Transform for DitherTransform {
    fn transform(&self, font: &mut Font, options: &OptionBag) -> Result<(), StageError> {
        let image = match &font.payload {
            Payload::Passthrough(image) => image,
            Payload::None => {
                return Err(StageError::new(10, format!("{PLUGIN_NAME}: payload missing")))
            }
            _ => {
                return Err(StageError::new(
                    11,
                    format!("{PLUGIN_NAME}: incompatible payload"),
                ))
            }
        };
        if image.pixels.is_empty() || image.width == 0 || image.height == 0 || image.stride == 0 {
            return Err(StageError::new(
                12,
                format!("{PLUGIN_NAME}: invalid source image buffer"),
            ));
        }
        let threshold = parse_threshold(options)? as f32;

        let w = i32::from(image.width);
        let h = i32::from(image.height);
        let src_stride = i32::from(image.stride);
        let stride = stride_for_bits(w);

        // Error-diffusion working copy.
        let mut work = vec![0.0f32; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                work[(y * w + x) as usize] = f32::from(image.pixels[(y * src_stride + x) as usize]);
            }
        }

        let mut glyph = GlyphBitmap {
            codepoint: 0,
            width: w,
            height: h,
            bearing_x: 0,
            bearing_y: h,
            advance: w,
            stride,
            data: vec![0; (stride * h) as usize],
        };

        let mut add_error = |work: &mut Vec<f32>, x: i32, y: i32, value: f32| {
            if x >= 0 && x < w && y >= 0 && y < h {
                work[(y * w + x) as usize] += value;
            }
        };

        for y in 0..h {
            for x in 0..w {
                let old_px = work[(y * w + x) as usize];
                let new_px = if old_px >= threshold { 255.0 } else { 0.0 };
                let err = old_px - new_px;

                if new_px < 128.0 {
                    glyph.set_bit(x, y);
                }

                add_error(&mut work, x + 1, y, err * (7.0 / 16.0));
                add_error(&mut work, x - 1, y + 1, err * (3.0 / 16.0));
                add_error(&mut work, x, y + 1, err * (5.0 / 16.0));
                add_error(&mut work, x + 1, y + 1, err * (1.0 / 16.0));
            }
        }

        font.glyph_width = w;
        font.glyph_height = h;
        font.first_codepoint = 0;
        font.last_codepoint = 0;
        font.bitmap = Some(BitmapFont::new(vec![glyph]));
        font.payload = Payload::None;
        Ok(())
    }
}
