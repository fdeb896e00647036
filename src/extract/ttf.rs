//! Scalable-font extractor: rasterizes a codepoint range of a TTF/OTF
//! face into packed 1bpp glyphs.
//!
//! Rasterization is delegated to `fontdue`; its grayscale coverage is
//! thresholded at 128 into the packed buffer, standing in for a
//! monochrome render target. Face names come from the name table via
//! `ttf-parser`.

use std::fs;
use std::path::Path;

use log::debug;

use crate::extract::{parse_int_option, parse_proportional};
use crate::font::{stride_for_bits, BitmapFont, Font, GlyphBitmap, Payload};
use crate::glyph::rightmost_set_bit;
use crate::options::OptionBag;
use crate::plugin::{Extract, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "ttf_extractor";

/// Coverage at or above this counts as ink.
const COVERAGE_THRESHOLD: u8 = 128;

/// Default codepoint range: printable ASCII.
const DEFAULT_FIRST: i32 = 32;
const DEFAULT_LAST: i32 = 126;

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Extracts bitmap glyphs from TTF input".to_string(),
            author: "snatch project".to_string(),
            format: "ttf".to_string(),
            standard: "extractor".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Extractor,
        },
        Stage::Extract(Box::new(TtfExtractor)),
    )
}

pub struct TtfExtractor;

impl Extract for TtfExtractor {
    fn extract(&self, input: &Path, options: &OptionBag) -> Result<Font, StageError> {
        if input.as_os_str().is_empty() {
            return Err(StageError::new(10, "ttf_extractor: input path is empty"));
        }

        let first = parse_int_option(options, "first_ascii", PLUGIN_NAME, 12)?
            .filter(|v| *v >= 0)
            .unwrap_or(DEFAULT_FIRST);
        let last = parse_int_option(options, "last_ascii", PLUGIN_NAME, 12)?
            .filter(|v| *v >= 0)
            .unwrap_or(DEFAULT_LAST);
        if first > last {
            return Err(StageError::new(12, "ttf_extractor: invalid codepoint range"));
        }
        let requested_size = parse_int_option(options, "font_size", PLUGIN_NAME, 12)?.unwrap_or(0);
        let proportional = parse_proportional(options, false, PLUGIN_NAME, 12)?;

        let data = fs::read(input).map_err(|err| {
            StageError::new(
                13,
                format!("ttf_extractor: failed to open TTF file: {}: {err}", input.display()),
            )
        })?;

        let name = face_name(&data).unwrap_or_else(|| "unknown".to_string());
        let face = fontdue::Font::from_bytes(data.as_slice(), fontdue::FontSettings::default())
            .map_err(|err| StageError::new(13, format!("ttf_extractor: {err}")))?;

        let size = if requested_size > 0 {
            requested_size
        } else {
            choose_natural_size(&face)
        };
        debug!("rasterizing '{}' at {} ppem, range {}..={}", name, size, first, last);

        let mut glyphs = Vec::with_capacity((last - first + 1) as usize);
        let mut max_width = 0;
        let mut max_height = 0;
        for cp in first..=last {
            let glyph = rasterize_glyph(&face, cp, size, proportional)
                .ok_or_else(|| {
                    StageError::new(
                        13,
                        format!("ttf_extractor: failed to load glyph for codepoint {cp}"),
                    )
                })?;
            max_width = max_width.max(glyph.width);
            max_height = max_height.max(glyph.height);
            glyphs.push(glyph);
        }

        Ok(Font {
            name,
            glyph_width: max_width,
            glyph_height: max_height,
            first_codepoint: first,
            last_codepoint: last,
            pixel_size: size,
            bitmap: Some(BitmapFont::new(glyphs)),
            payload: Payload::None,
        })
    }
}

/// Family plus subfamily from the face's name table.
fn face_name(data: &[u8]) -> Option<String> {
    let face = ttf_parser::Face::parse(data, 0).ok()?;
    let family = face
        .names()
        .into_iter()
        .find(|n| n.name_id == ttf_parser::name_id::FAMILY)
        .and_then(|n| n.to_string())?;
    let subfamily = face
        .names()
        .into_iter()
        .find(|n| n.name_id == ttf_parser::name_id::SUBFAMILY)
        .and_then(|n| n.to_string());
    Some(match subfamily {
        Some(sub) if !sub.is_empty() => format!("{family} {sub}"),
        _ => family,
    })
}

/// Rasterizes one codepoint into a packed glyph.
fn rasterize_glyph(face: &fontdue::Font, codepoint: i32, size: i32, proportional: bool) -> Option<GlyphBitmap> {
    let ch = char::from_u32(codepoint as u32)?;
    let (metrics, coverage) = face.rasterize(ch, size as f32);

    let width = metrics.width as i32;
    let height = metrics.height as i32;
    let stride = stride_for_bits(width);
    let mut glyph = GlyphBitmap {
        codepoint,
        width,
        height,
        bearing_x: metrics.xmin,
        bearing_y: metrics.ymin + height,
        advance: metrics.advance_width.round() as i32,
        stride,
        data: vec![0; (stride * height) as usize],
    };

    for y in 0..height {
        for x in 0..width {
            if coverage[(y * width + x) as usize] >= COVERAGE_THRESHOLD {
                glyph.set_bit(x, y);
            }
        }
    }

    if proportional {
        let rightmost = rightmost_set_bit(&glyph);
        glyph.width = if rightmost >= 0 { rightmost + 1 } else { 0 };
    }
    Some(glyph)
}

/// Scores pixel sizes 8..=32 against a readable target shape and keeps the
/// best. Used when the caller gives no explicit `font_size`.
fn choose_natural_size(face: &fontdue::Font) -> i32 {
    const SAMPLE_CHARS: [i32; 7] = ['H' as i32, 'n' as i32, 'm' as i32, '0' as i32, '8' as i32, 'A' as i32, 'a' as i32];
    const TARGET_HEIGHT: f64 = 14.0;
    const TARGET_WIDTH: f64 = 8.0;

    let mut best_size = 16;
    let mut best_score = f64::NEG_INFINITY;

    for size in 8..=32 {
        let mut non_empty = 0;
        let mut total_w = 0;
        let mut total_h = 0;
        for cp in SAMPLE_CHARS {
            if let Some(g) = rasterize_glyph(face, cp, size, false) {
                if g.width > 0 && g.height > 0 {
                    non_empty += 1;
                    total_w += g.width;
                    total_h += g.height;
                }
            }
        }
        if non_empty == 0 {
            continue;
        }

        let avg_h = f64::from(total_h) / f64::from(non_empty);
        let avg_w = f64::from(total_w) / f64::from(non_empty);
        let score = f64::from(non_empty) * 100.0
            - (avg_h - TARGET_HEIGHT).abs() * 12.0
            - (avg_w - TARGET_WIDTH).abs() * 6.0;
        if score > best_score {
            best_score = score;
            best_size = size;
        }
    }
    best_size
}
