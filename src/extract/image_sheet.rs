//! Image-sheet extractor: slices a glyph grid out of a raster image and
//! classifies pixels into foreground ink.

use std::path::Path;

use log::debug;

use crate::extract::{parse_int_option, parse_proportional};
use crate::font::{stride_for_bits, BitmapFont, Font, GlyphBitmap, Payload};
use crate::glyph::rightmost_set_bit;
use crate::options::{parse_hex_rgb, OptionBag};
use crate::plugin::{Extract, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "image_extractor";

/// Euclidean RGB distance under which a pixel matches the transparent
/// key color.
const TRANSPARENT_THRESHOLD: i32 = 48;

const DEFAULT_FIRST: i32 = 32;
const DEFAULT_LAST: i32 = 126;

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Extracts bitmap glyphs from image sheets".to_string(),
            author: "snatch project".to_string(),
            format: "image".to_string(),
            standard: "extractor".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Extractor,
        },
        Stage::Extract(Box::new(ImageSheetExtractor)),
    )
}

/// Per-edge insets, in pixels.
#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

struct SheetOptions {
    columns: i32,
    rows: i32,
    first: i32,
    last: i32,
    margins: Edges,
    padding: Edges,
    inverse: bool,
    proportional: bool,
    fore_color: [u8; 3],
    back_color: [u8; 3],
    transparent_color: Option<[u8; 3]>,
}

fn parse_color_option(
    options: &OptionBag,
    key: &str,
    default: [u8; 3],
    code: i32,
) -> Result<[u8; 3], StageError> {
    match options.get_non_empty(key) {
        None => Ok(default),
        Some(raw) => parse_hex_rgb(raw).ok_or_else(|| {
            StageError::new(code, format!("{PLUGIN_NAME}: invalid {key}; expected #RRGGBB"))
        }),
    }
}

fn parse_sheet_options(options: &OptionBag) -> Result<SheetOptions, StageError> {
    let int = |key: &str| parse_int_option(options, key, PLUGIN_NAME, 12);
    let margins = Edges {
        left: int("margins_left")?.unwrap_or(0),
        top: int("margins_top")?.unwrap_or(0),
        right: int("margins_right")?.unwrap_or(0),
        bottom: int("margins_bottom")?.unwrap_or(0),
    };
    let padding = Edges {
        left: int("padding_left")?.unwrap_or(0),
        top: int("padding_top")?.unwrap_or(0),
        right: int("padding_right")?.unwrap_or(0),
        bottom: int("padding_bottom")?.unwrap_or(0),
    };

    let transparent_color = match options.get_non_empty("transparent_color") {
        None => None,
        Some(_) => Some(parse_color_option(options, "transparent_color", [255, 0, 255], 15)?),
    };

    Ok(SheetOptions {
        columns: int("columns")?.unwrap_or(0),
        rows: int("rows")?.unwrap_or(0),
        first: int("first_ascii")?.filter(|v| *v >= 0).unwrap_or(DEFAULT_FIRST),
        last: int("last_ascii")?.filter(|v| *v >= 0).unwrap_or(DEFAULT_LAST),
        margins,
        padding,
        inverse: options.get_bool("inverse", false),
        proportional: parse_proportional(options, false, PLUGIN_NAME, 12)?,
        fore_color: parse_color_option(options, "fore_color", [0, 0, 0], 13)?,
        back_color: parse_color_option(options, "back_color", [255, 255, 255], 14)?,
        transparent_color,
    })
}

fn color_distance_sq(pixel: [u8; 3], reference: [u8; 3]) -> i64 {
    let dr = i64::from(pixel[0]) - i64::from(reference[0]);
    let dg = i64::from(pixel[1]) - i64::from(reference[1]);
    let db = i64::from(pixel[2]) - i64::from(reference[2]);
    dr * dr + dg * dg + db * db
}

fn pixel_is_foreground(rgba: [u8; 4], opt: &SheetOptions) -> bool {
    if rgba[3] == 0 {
        return false;
    }
    let rgb = [rgba[0], rgba[1], rgba[2]];
    if let Some(key) = opt.transparent_color {
        let threshold = i64::from(TRANSPARENT_THRESHOLD) * i64::from(TRANSPARENT_THRESHOLD);
        if color_distance_sq(rgb, key) <= threshold {
            return false;
        }
    }
    let on = color_distance_sq(rgb, opt.fore_color) <= color_distance_sq(rgb, opt.back_color);
    on != opt.inverse
}

pub struct ImageSheetExtractor;

impl Extract for ImageSheetExtractor {
    fn extract(&self, input: &Path, options: &OptionBag) -> Result<Font, StageError> {
        if input.as_os_str().is_empty() {
            return Err(StageError::new(10, "image_extractor: input path is empty"));
        }
        let opt = parse_sheet_options(options)?;

        let image = image::open(input)
            .map_err(|err| {
                StageError::new(
                    16,
                    format!(
                        "image_extractor: failed to open image file: {}: {err}",
                        input.display()
                    ),
                )
            })?
            .to_rgba8();
        let (img_w, img_h) = (image.width() as i32, image.height() as i32);

        if opt.first > opt.last {
            return Err(StageError::new(16, "image_extractor: invalid codepoint range"));
        }
        if opt.columns <= 0 {
            return Err(StageError::new(
                16,
                "image_extractor: image extraction requires columns (>0)",
            ));
        }

        let glyph_count = opt.last - opt.first + 1;
        let rows = if opt.rows > 0 {
            opt.rows
        } else {
            (glyph_count + opt.columns - 1) / opt.columns
        };
        if rows <= 0 {
            return Err(StageError::new(16, "image_extractor: invalid row count for image extraction"));
        }
        if opt.columns * rows < glyph_count {
            return Err(StageError::new(
                16,
                "image_extractor: grid too small for requested ASCII range (columns*rows < glyph count)",
            ));
        }

        let usable_w = img_w - opt.margins.left - opt.margins.right;
        let usable_h = img_h - opt.margins.top - opt.margins.bottom;
        if usable_w <= 0 || usable_h <= 0 {
            return Err(StageError::new(16, "image_extractor: invalid margins: no drawable area remains"));
        }

        let cell_w = usable_w / opt.columns;
        let cell_h = usable_h / rows;
        if cell_w <= 0 || cell_h <= 0 {
            return Err(StageError::new(
                16,
                "image_extractor: grid cell size became zero; check margins/rows/columns",
            ));
        }

        let draw_w = cell_w - opt.padding.left - opt.padding.right;
        let draw_h = cell_h - opt.padding.top - opt.padding.bottom;
        if draw_w <= 0 || draw_h <= 0 {
            return Err(StageError::new(
                16,
                "image_extractor: invalid padding: no drawable area remains inside glyph cell",
            ));
        }

        debug!(
            "slicing {}x{} sheet into {}x{} cells of {}x{}",
            img_w, img_h, opt.columns, rows, cell_w, cell_h
        );

        let full_stride = stride_for_bits(draw_w);
        let mut glyphs = Vec::with_capacity(glyph_count as usize);
        let mut max_width = 0;
        let mut max_height = 0;

        for i in 0..glyph_count {
            let codepoint = opt.first + i;
            let row = i / opt.columns;
            let col = i % opt.columns;
            let start_x = opt.margins.left + col * cell_w + opt.padding.left;
            let start_y = opt.margins.top + row * cell_h + opt.padding.top;

            let mut glyph = GlyphBitmap {
                codepoint,
                width: draw_w,
                height: draw_h,
                bearing_x: 0,
                bearing_y: draw_h,
                advance: draw_w,
                stride: full_stride,
                data: vec![0; (full_stride * draw_h) as usize],
            };

            for y in 0..draw_h {
                let sy = start_y + y;
                for x in 0..draw_w {
                    let sx = start_x + x;
                    if sx < 0 || sx >= img_w || sy < 0 || sy >= img_h {
                        continue;
                    }
                    let rgba = image.get_pixel(sx as u32, sy as u32).0;
                    if pixel_is_foreground(rgba, &opt) {
                        glyph.set_bit(x, y);
                    }
                }
            }

            if opt.proportional {
                trim_proportional(&mut glyph);
            }

            max_width = max_width.max(glyph.width);
            max_height = max_height.max(glyph.height);
            glyphs.push(glyph);
        }

        let name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Font {
            name,
            glyph_width: max_width,
            glyph_height: max_height,
            first_codepoint: opt.first,
            last_codepoint: opt.last,
            pixel_size: 0,
            bitmap: Some(BitmapFont::new(glyphs)),
            payload: Payload::None,
        })
    }
}

/// Narrows a glyph to its rightmost ink column and repacks rows to the
/// narrower stride.
fn trim_proportional(glyph: &mut GlyphBitmap) {
    let rightmost = rightmost_set_bit(glyph);
    let new_width = if rightmost >= 0 { rightmost + 1 } else { 0 };
    let new_stride = stride_for_bits(new_width);
    if new_stride == glyph.stride {
        glyph.width = new_width;
        glyph.advance = new_width;
        return;
    }

    let mut packed = GlyphBitmap {
        width: new_width,
        height: glyph.height,
        stride: new_stride,
        data: vec![0; (new_stride * glyph.height).max(0) as usize],
        ..glyph.clone()
    };
    for y in 0..glyph.height {
        for x in 0..new_width {
            if glyph.bit(x, y) {
                packed.set_bit(x, y);
            }
        }
    }
    packed.advance = new_width;
    *glyph = packed;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreground_classification() {
        let opt = SheetOptions {
            columns: 1,
            rows: 1,
            first: 65,
            last: 65,
            margins: Edges::default(),
            padding: Edges::default(),
            inverse: false,
            proportional: false,
            fore_color: [0, 0, 0],
            back_color: [255, 255, 255],
            transparent_color: Some([255, 0, 255]),
        };
        assert!(pixel_is_foreground([10, 10, 10, 255], &opt));
        assert!(!pixel_is_foreground([250, 250, 250, 255], &opt));
        assert!(!pixel_is_foreground([0, 0, 0, 0], &opt), "fully transparent");
        assert!(!pixel_is_foreground([250, 20, 250, 255], &opt), "near key color");
    }

    #[test]
    fn inverse_flips_classification() {
        let opt = SheetOptions {
            columns: 1,
            rows: 1,
            first: 65,
            last: 65,
            margins: Edges::default(),
            padding: Edges::default(),
            inverse: true,
            proportional: false,
            fore_color: [0, 0, 0],
            back_color: [255, 255, 255],
            transparent_color: None,
        };
        assert!(!pixel_is_foreground([10, 10, 10, 255], &opt));
        assert!(pixel_is_foreground([250, 250, 250, 255], &opt));
    }

    #[test]
    fn missing_columns_is_rejected() {
        // The option error surfaces after image decode, so feed a real
        // image through the in-memory path by writing a tiny sheet.
        let dir = std::env::temp_dir().join(format!("snatch_sheet_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sheet.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();

        let err = ImageSheetExtractor
            .extract(&path, &OptionBag::parse("first_ascii=65,last_ascii=65"))
            .unwrap_err();
        assert!(err.message.contains("requires columns"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn grid_too_small_is_rejected() {
        let dir = std::env::temp_dir().join(format!("snatch_sheet_small_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sheet.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();

        let options = OptionBag::parse("columns=1,rows=1,first_ascii=65,last_ascii=70");
        let err = ImageSheetExtractor.extract(&path, &options).unwrap_err();
        assert!(err.message.contains("grid too small"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn extracts_single_cell_sheet() {
        let dir = std::env::temp_dir().join(format!("snatch_sheet_ok_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("glyphs.png");
        let mut sheet = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]));
        sheet.put_pixel(1, 2, image::Rgba([0, 0, 0, 255]));
        sheet.put_pixel(6, 5, image::Rgba([0, 0, 0, 255]));
        sheet.save(&path).unwrap();

        let options = OptionBag::parse("columns=1,rows=1,first_ascii=65,last_ascii=65");
        let font = ImageSheetExtractor.extract(&path, &options).unwrap();
        assert_eq!(font.name, "glyphs");
        assert_eq!(font.codepoint_count(), 1);
        let glyph = font.bitmap.as_ref().unwrap().glyph(65).unwrap();
        assert!(glyph.height >= 1);
        assert!(glyph.bit(1, 2));
        assert!(glyph.bit(6, 5));
        assert!(!glyph.bit(0, 0));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn proportional_trim_repacks_stride() {
        let dir = std::env::temp_dir().join(format!("snatch_sheet_prop_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("wide.png");
        let mut sheet = image::RgbaImage::from_pixel(16, 4, image::Rgba([255, 255, 255, 255]));
        sheet.put_pixel(2, 1, image::Rgba([0, 0, 0, 255]));
        sheet.save(&path).unwrap();

        let options =
            OptionBag::parse("columns=1,rows=1,first_ascii=65,last_ascii=65,font_mode=proportional");
        let font = ImageSheetExtractor.extract(&path, &options).unwrap();
        let glyph = font.bitmap.as_ref().unwrap().glyph(65).unwrap();
        assert_eq!(glyph.width, 3);
        assert_eq!(glyph.stride, 1);
        assert!(glyph.bit(2, 1));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
