//! PNG grid exporter: renders every glyph into a baseline-aligned grid
//! image.

use std::path::Path;

use image::{Rgb, RgbImage};
use log::debug;

use crate::font::{Font, GlyphBitmap};
use crate::options::{parse_hex_rgb, OptionBag};
use crate::plugin::{Export, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "png";

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Exports bitmap glyphs into a PNG grid".to_string(),
            author: "snatch project".to_string(),
            format: "png".to_string(),
            standard: "grid-preview".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Exporter,
        },
        Stage::Export(Box::new(PngGridExporter)),
    )
}

fn positive_option(options: &OptionBag, key: &str) -> Result<i32, StageError> {
    match options.get_non_empty(key) {
        None => Ok(0),
        Some(raw) => crate::options::parse_int(raw)
            .filter(|v| (0..=1_000_000).contains(v))
            .ok_or_else(|| StageError::new(15, format!("{PLUGIN_NAME}: invalid {key}"))),
    }
}

/// Grid geometry: inferred when either dimension is omitted.
fn grid_dimensions(glyph_count: i32, columns: i32, rows: i32) -> (i32, i32) {
    match (columns > 0, rows > 0) {
        (true, true) => (columns, rows),
        (true, false) => (columns, (glyph_count + columns - 1) / columns),
        (false, true) => ((glyph_count + rows - 1) / rows, rows),
        (false, false) => {
            let cols = (f64::from(glyph_count).sqrt().ceil()) as i32;
            (cols, (glyph_count + cols - 1) / cols)
        }
    }
}

fn draw_glyph(image: &mut RgbImage, dst_x: i32, dst_y: i32, glyph: &GlyphBitmap) {
    if glyph.is_blank() {
        return;
    }
    let (w, h) = (image.width() as i32, image.height() as i32);
    for y in 0..glyph.height {
        let yy = dst_y + y;
        if yy < 0 || yy >= h {
            continue;
        }
        for x in 0..glyph.width {
            let xx = dst_x + x;
            if xx < 0 || xx >= w {
                continue;
            }
            if glyph.bit(x, y) {
                image.put_pixel(xx as u32, yy as u32, BLACK);
            }
        }
    }
}

pub struct PngGridExporter;

impl Export for PngGridExporter {
    fn export(&self, font: &Font, output: &Path, options: &OptionBag) -> Result<(), StageError> {
        let bitmap = font
            .bitmap
            .as_ref()
            .ok_or_else(|| StageError::new(10, "png: bitmap font data missing"))?;
        if output.as_os_str().is_empty() {
            return Err(StageError::new(11, "png: output path is empty"));
        }
        let glyph_count = bitmap.glyphs.len() as i32;
        if glyph_count <= 0 {
            return Err(StageError::new(12, "png: no glyphs to export"));
        }

        let columns = positive_option(options, "columns")?;
        let rows = positive_option(options, "rows")?;
        let padding = positive_option(options, "padding")?;
        let thickness = positive_option(options, "grid_thickness")?;
        let grid_color = match options.get_non_empty("grid_color") {
            None => BLACK,
            Some(raw) => parse_hex_rgb(raw)
                .map(Rgb)
                .ok_or_else(|| StageError::new(15, "png: invalid grid_color; expected #RRGGBB"))?,
        };

        let (cols, rows) = grid_dimensions(glyph_count, columns, rows);

        // Shared cell geometry: widest glyph and a common baseline.
        let mut cell_w = font.glyph_width.max(1);
        let mut max_bearing_y = 0;
        let mut min_descender = 0;
        for glyph in &bitmap.glyphs {
            cell_w = cell_w.max(glyph.width);
            max_bearing_y = max_bearing_y.max(glyph.bearing_y);
            min_descender = min_descender.min(glyph.bearing_y - glyph.height);
        }
        let cell_h = (max_bearing_y - min_descender).max(1);

        let draw_w = cell_w + padding * 2;
        let draw_h = cell_h + padding * 2;
        let image_w = cols * draw_w + (cols + 1) * thickness;
        let image_h = rows * draw_h + (rows + 1) * thickness;
        if image_w <= 0 || image_h <= 0 {
            return Err(StageError::new(13, "png: invalid image dimensions"));
        }

        debug!(
            "rendering {} glyphs into a {}x{} grid ({}x{} px)",
            glyph_count, cols, rows, image_w, image_h
        );

        let mut image = RgbImage::from_pixel(image_w as u32, image_h as u32, WHITE);

        if thickness > 0 {
            for line in 0..=cols {
                let x0 = line * (draw_w + thickness);
                for x in x0..x0 + thickness {
                    for y in 0..image_h {
                        image.put_pixel(x as u32, y as u32, grid_color);
                    }
                }
            }
            for line in 0..=rows {
                let y0 = line * (draw_h + thickness);
                for y in y0..y0 + thickness {
                    for x in 0..image_w {
                        image.put_pixel(x as u32, y as u32, grid_color);
                    }
                }
            }
        }

        for (i, glyph) in bitmap.glyphs.iter().enumerate() {
            let i = i as i32;
            let cell_x = thickness + (i % cols) * (draw_w + thickness) + padding;
            let cell_y = thickness + (i / cols) * (draw_h + thickness) + padding;
            let baseline_y = cell_y + max_bearing_y;
            draw_glyph(&mut image, cell_x, baseline_y - glyph.bearing_y, glyph);
        }

        image
            .save(output)
            .map_err(|err| StageError::new(14, format!("png: failed to write png: {err}")))
    }
}
