//! SDCC assembly exporter for Partner bitmap fonts: payload rows are
//! rendered as binary literals so the glyph shape reads straight off the
//! source.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::codec::partner_bitmap::{cell_metrics, pack_glyph_rows, GLYPH_CLASS_BITMAP};
use crate::codec::{pack_flags, HEADER_LEN, MAX_STREAM_LEN};
use crate::export::partner_asm::{
    glyph_label, module_and_symbol, write_asm_prologue, write_db, write_dw_rows,
};
use crate::font::Font;
use crate::options::OptionBag;
use crate::plugin::{Export, PluginKind, PluginMeta, PluginRecord, Stage, StageError};
use crate::transform::parse_partner_flags;

pub const PLUGIN_NAME: &str = "partner_sdcc_asm_bitmap";

const INDENT: &str = "        ";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Exports Partner-style bitmap assembly with per-row binary bytes (.db 0bxxxxxxxx)".to_string(),
            author: "snatch project".to_string(),
            format: "asm".to_string(),
            standard: "partner-sdcc-asm-bitmap".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Exporter,
        },
        Stage::Export(Box::new(PartnerBitmapAsmExporter)),
    )
}

fn to_bin8(byte: u8) -> String {
    format!("{byte:08b}")
}

pub struct PartnerBitmapAsmExporter;

impl Export for PartnerBitmapAsmExporter {
    fn export(&self, font: &Font, output: &Path, options: &OptionBag) -> Result<(), StageError> {
        let bitmap = font.bitmap.as_ref().ok_or_else(|| {
            StageError::new(10, format!("{PLUGIN_NAME}: bitmap font data missing"))
        })?;
        if output.as_os_str().is_empty() {
            return Err(StageError::new(11, format!("{PLUGIN_NAME}: output path is empty")));
        }
        let first = font.first_codepoint;
        let last = font.last_codepoint;
        if first < 0 || last < first || last > 255 {
            return Err(StageError::new(12, format!("{PLUGIN_NAME}: invalid codepoint range")));
        }

        let (proportional, letter_spacing, space_width) =
            parse_partner_flags(options, PLUGIN_NAME, 13, 18, 19)?;
        let flags = pack_flags(proportional, space_width.unwrap_or(0) as u8, letter_spacing as u8);

        let (module, symbol) = module_and_symbol(output, options);

        let metrics = cell_metrics(bitmap, first, last);
        let fixed_cell_width = metrics.max_width.max(1);

        let mut cells = Vec::with_capacity((last - first + 1) as usize);
        for cp in first..=last {
            let glyph = bitmap.glyph(cp);
            let cell_width = if proportional {
                glyph.map_or(0, |g| g.width).max(0)
            } else {
                fixed_cell_width
            };
            let cell = pack_glyph_rows(glyph, cell_width, metrics.cell_height, metrics.max_bearing_y);
            if cell.payload.len() > 255 {
                return Err(StageError::new(
                    17,
                    format!("{PLUGIN_NAME}: glyph payload too large for 1-byte length"),
                ));
            }
            cells.push((cp, cell));
        }

        let mut offsets = Vec::with_capacity(cells.len());
        let mut offset = HEADER_LEN + cells.len() * 2;
        for (_, cell) in &cells {
            if offset > MAX_STREAM_LEN {
                return Err(StageError::new(14, format!("{PLUGIN_NAME}: font too large (>64KiB)")));
            }
            offsets.push(offset as u16);
            offset += 4 + cell.payload.len();
        }

        let mut text = String::new();
        write_asm_prologue(&mut text, &module, &symbol);

        let _ = writeln!(text, "{INDENT};; font header");
        write_db(
            &mut text,
            flags,
            "font flags (bit7 prop, bits4-6 space width, bits0-3 letter spacing)",
        );
        write_db(
            &mut text,
            metrics.max_width.clamp(0, 255) as u8,
            "width (max width for proportional)",
        );
        write_db(&mut text, metrics.cell_height.clamp(0, 255) as u8, "height");
        write_db(&mut text, first as u8, "first ascii");
        write_db(&mut text, last as u8, "last ascii");
        text.push('\n');

        let _ = writeln!(text, "{INDENT};; glyph offsets");
        write_dw_rows(&mut text, &offsets);
        text.push('\n');

        for (cp, cell) in &cells {
            let _ = writeln!(text, "{INDENT};; ascii {cp}: {}", glyph_label(*cp));
            write_db(&mut text, GLYPH_CLASS_BITMAP << 5, "class(bits 5-7)");
            write_db(&mut text, cell.width, "width");
            write_db(&mut text, cell.height, "height");
            write_db(&mut text, cell.payload.len().min(255) as u8, "# bytes");

            if cell.payload.is_empty() || cell.bytes_per_row <= 0 || cell.height == 0 {
                continue;
            }
            for y in 0..i32::from(cell.height) {
                let row: Vec<String> = (0..cell.bytes_per_row)
                    .map(|b| {
                        let byte = cell.payload[(y * cell.bytes_per_row + b) as usize];
                        format!("0b{}", to_bin8(byte))
                    })
                    .collect();
                let _ = writeln!(text, "{INDENT}.db {} ; row {y}", row.join(", "));
            }
        }

        fs::write(output, text).map_err(|err| {
            StageError::new(15, format!("{PLUGIN_NAME}: cannot write output file: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{stride_for_bits, BitmapFont, GlyphBitmap};

    fn out_path(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("snatch_basm_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("bitmap_font.s")
    }

    fn bitmap_font_value() -> Font {
        let mut glyph = GlyphBitmap {
            codepoint: 66,
            width: 8,
            height: 2,
            bearing_x: 0,
            bearing_y: 2,
            advance: 8,
            stride: stride_for_bits(8),
            data: vec![0; 2],
        };
        glyph.set_bit(0, 0);
        glyph.set_bit(7, 1);
        Font {
            glyph_width: 8,
            glyph_height: 2,
            first_codepoint: 66,
            last_codepoint: 66,
            bitmap: Some(BitmapFont::new(vec![glyph])),
            ..Default::default()
        }
    }

    #[test]
    fn renders_binary_rows() {
        let path = out_path("rows");
        PartnerBitmapAsmExporter
            .export(&bitmap_font_value(), &path, &OptionBag::new())
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(".module bitmap_font"));
        assert!(text.contains(";; ascii 66: 'B'"));
        assert!(text.contains("0b10000000 ; row 0"));
        assert!(text.contains("0b00000001 ; row 1"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn proportional_requires_space_width() {
        let path = out_path("prop");
        let err = PartnerBitmapAsmExporter
            .export(
                &bitmap_font_value(),
                &path,
                &OptionBag::parse("font_mode=proportional"),
            )
            .unwrap_err();
        assert_eq!(err.code, 19);
        assert!(err.message.contains("space_width is required"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_bitmap_is_rejected() {
        let err = PartnerBitmapAsmExporter
            .export(&Font::default(), &out_path("nobitmap"), &OptionBag::new())
            .unwrap_err();
        assert_eq!(err.code, 10);
    }
}
