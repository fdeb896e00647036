//! Grayscale passthrough extractor: hands a whole image to a downstream
//! transformer (typically the 1bpp dither) without slicing glyphs.

use std::path::Path;

use crate::font::{Font, PassthroughImage, Payload};
use crate::options::OptionBag;
use crate::plugin::{Extract, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "image_passthrough_extractor";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Loads image as grayscale passthrough payload".to_string(),
            author: "snatch project".to_string(),
            format: "image".to_string(),
            standard: "passthrough-gray8".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Extractor,
        },
        Stage::Extract(Box::new(PassthroughExtractor)),
    )
}

pub struct PassthroughExtractor;

impl Extract for PassthroughExtractor {
    fn extract(&self, input: &Path, _options: &OptionBag) -> Result<Font, StageError> {
        if input.as_os_str().is_empty() {
            return Err(StageError::new(10, "image_passthrough_extractor: input path is empty"));
        }

        let gray = image::open(input)
            .map_err(|err| {
                StageError::new(
                    12,
                    format!("image_passthrough_extractor: failed to load image: {err}"),
                )
            })?
            .to_luma8();
        let (width, height) = (gray.width(), gray.height());
        if width == 0 || height == 0 || width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(StageError::new(
                12,
                "image_passthrough_extractor: failed to load image",
            ));
        }

        Ok(Font {
            name: "image-passthrough".to_string(),
            glyph_width: width as i32,
            glyph_height: height as i32,
            first_codepoint: 0,
            last_codepoint: 0,
            pixel_size: 0,
            bitmap: None,
            payload: Payload::Passthrough(PassthroughImage {
                width: width as u16,
                height: height as u16,
                stride: width as u16,
                pixels: gray.into_raw(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_image_into_payload() {
        let dir = std::env::temp_dir().join(format!("snatch_pass_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gradient.png");
        let img = image::GrayImage::from_fn(4, 2, |x, y| image::Luma([(x * 60 + y * 10) as u8]));
        img.save(&path).unwrap();

        let font = PassthroughExtractor.extract(&path, &OptionBag::new()).unwrap();
        assert_eq!(font.glyph_width, 4);
        assert_eq!(font.glyph_height, 2);
        assert!(font.bitmap.is_none());
        match &font.payload {
            Payload::Passthrough(image) => {
                assert_eq!(image.width, 4);
                assert_eq!(image.stride, 4);
                assert_eq!(image.pixels.len(), 8);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_input_is_reported() {
        let err = PassthroughExtractor
            .extract(Path::new("/nonexistent/image.png"), &OptionBag::new())
            .unwrap_err();
        assert_eq!(err.code, 12);
        assert!(err.message.contains("failed to load image"));
    }
}
