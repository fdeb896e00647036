//! SDCC assembly exporter for Partner Tiny vector fonts.
//!
//! Renders the Tiny stream structurally as `.db`/`.dw` directives with
//! decoded per-move comments, so the generated source stays reviewable.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::codec::partner_tiny::{decode_move, COLOR_BACK, COLOR_FORE, COLOR_NONE, GLYPH_CLASS_TINY};
use crate::codec::{pack_flags, HEADER_LEN, MAX_STREAM_LEN};
use crate::export::{identifier_from_output, sanitize_identifier};
use crate::font::{Font, Payload, TinyFont};
use crate::options::OptionBag;
use crate::plugin::{Export, PluginKind, PluginMeta, PluginRecord, Stage, StageError};
use crate::transform::parse_partner_flags;

pub const PLUGIN_NAME: &str = "partner_sdcc_asm_tiny";

const INDENT: &str = "        ";
const DEFAULT_SYMBOL: &str = "snatch_font";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Exports Partner Tiny-vector font assembly (.db/.dw); requires partner_tiny_transform".to_string(),
            author: "snatch project".to_string(),
            format: "asm".to_string(),
            standard: "partner-sdcc-asm-tiny".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Exporter,
        },
        Stage::Export(Box::new(PartnerAsmExporter)),
    )
}

pub(crate) fn write_db(text: &mut String, value: u8, comment: &str) {
    let _ = writeln!(text, "{INDENT}.db {:<20}; {comment}", value);
}

pub(crate) fn write_dw_rows(text: &mut String, offsets: &[u16]) {
    for chunk in offsets.chunks(8) {
        let row: Vec<String> = chunk.iter().map(|v| format!("0x{v:04X}")).collect();
        let _ = writeln!(text, "{INDENT}.dw {}", row.join(", "));
    }
}

pub(crate) fn glyph_label(codepoint: i32) -> String {
    match codepoint {
        127 => "<non standard>".to_string(),
        39 => "'''".to_string(),
        32..=126 => format!("'{}'", codepoint as u8 as char),
        _ => "'?'".to_string(),
    }
}

fn move_comment(byte: u8) -> String {
    let mv = decode_move(byte);
    let color = match mv.color {
        COLOR_NONE => "none (move only!)",
        COLOR_FORE => "fore (set)",
        COLOR_BACK => "back (clear)",
        _ => "xor (toggle)",
    };
    format!("move dx={}, dy={}, color={}", mv.dx, mv.dy, color)
}

/// Shared module/symbol resolution for the assembly exporters.
pub(crate) fn module_and_symbol(output: &Path, options: &OptionBag) -> (String, String) {
    let mut module = identifier_from_output(output, DEFAULT_SYMBOL);
    if let Some(requested) = options.get_non_empty("module") {
        module = sanitize_identifier(requested, DEFAULT_SYMBOL);
    }
    let mut symbol = module.clone();
    if let Some(requested) = options.get_non_empty("symbol") {
        symbol = sanitize_identifier(requested, DEFAULT_SYMBOL);
    }
    (module, symbol)
}

pub(crate) fn write_asm_prologue(text: &mut String, module: &str, symbol: &str) {
    let _ = writeln!(text, "{INDENT};;  {module}.s");
    let _ = writeln!(text, "{INDENT};;  ");
    let _ = writeln!(text, "{INDENT};;  {module}");
    let _ = writeln!(text, "{INDENT};; ");
    let _ = writeln!(text, "{INDENT};;  notes: see font.h for format details");
    let _ = writeln!(text, "{INDENT};;  ");
    let _ = writeln!(text, "{INDENT};;  generated by snatch");
    let _ = writeln!(text, "{INDENT}.module {module}");
    text.push('\n');
    let _ = writeln!(text, "{INDENT}.globl _{symbol}");
    text.push('\n');
    let _ = writeln!(text, "{INDENT}.area _CODE");
    let _ = writeln!(text, "_{symbol}::");
}

fn tiny_payload(font: &Font) -> Result<&TinyFont, StageError> {
    match &font.payload {
        Payload::TinyFont(tiny) => Ok(tiny),
        Payload::None => Err(StageError::new(
            13,
            format!("{PLUGIN_NAME}: missing transformed data; use --transformer partner_tiny_transform"),
        )),
        _ => Err(StageError::new(
            14,
            format!("{PLUGIN_NAME}: incompatible payload; expected partner_tiny_transform output"),
        )),
    }
}

pub struct PartnerAsmExporter;

impl Export for PartnerAsmExporter {
    fn export(&self, font: &Font, output: &Path, options: &OptionBag) -> Result<(), StageError> {
        if output.as_os_str().is_empty() {
            return Err(StageError::new(11, format!("{PLUGIN_NAME}: output path is empty")));
        }
        let first = font.first_codepoint;
        let last = font.last_codepoint;
        if first < 0 || last < first || last > 255 {
            return Err(StageError::new(12, format!("{PLUGIN_NAME}: invalid codepoint range")));
        }

        let tiny = tiny_payload(font)?;
        let expected = (last - first + 1) as usize;
        if tiny.glyphs.len() != expected {
            return Err(StageError::new(
                15,
                format!("{PLUGIN_NAME}: transformed glyph table does not match ascii range"),
            ));
        }

        let (proportional, letter_spacing, space_width) =
            parse_partner_flags(options, PLUGIN_NAME, 16, 21, 22)?;
        let flags = pack_flags(proportional, space_width.unwrap_or(0) as u8, letter_spacing as u8);

        let (module, symbol) = module_and_symbol(output, options);

        let mut offsets = Vec::with_capacity(tiny.glyphs.len());
        let mut offset = HEADER_LEN + tiny.glyphs.len() * 2;
        for glyph in &tiny.glyphs {
            if offset > MAX_STREAM_LEN {
                return Err(StageError::new(17, format!("{PLUGIN_NAME}: font too large (>64KiB)")));
            }
            offsets.push(offset as u16);
            offset += 4 + glyph.data.len();
        }

        let mut text = String::new();
        write_asm_prologue(&mut text, &module, &symbol);

        let _ = writeln!(text, "{INDENT};; font header");
        write_db(
            &mut text,
            flags,
            "font flags (bit7 prop, bits4-6 space width, bits0-3 letter spacing)",
        );
        write_db(&mut text, tiny.max_width_minus_one, "width (max width for proportional)");
        write_db(&mut text, tiny.max_height_minus_one, "height");
        write_db(&mut text, first as u8, "first ascii");
        write_db(&mut text, last as u8, "last ascii");
        text.push('\n');

        let _ = writeln!(text, "{INDENT};; glyph offsets");
        write_dw_rows(&mut text, &offsets);
        text.push('\n');

        for (i, glyph) in tiny.glyphs.iter().enumerate() {
            let codepoint = first + i as i32;
            let _ = writeln!(text, "{INDENT};; ascii {codepoint}: {}", glyph_label(codepoint));
            write_db(&mut text, GLYPH_CLASS_TINY << 5, "class(bits 5-7)");
            write_db(&mut text, glyph.width_minus_one, "width");
            write_db(&mut text, glyph.height_minus_one, "height");

            if glyph.data.is_empty() {
                write_db(&mut text, 0, "# moves");
                continue;
            }
            if glyph.data.len() < 2 {
                return Err(StageError::new(
                    20,
                    format!("{PLUGIN_NAME}: malformed glyph data (origin missing)"),
                ));
            }

            write_db(&mut text, (glyph.data.len() - 2) as u8, "# moves");
            write_db(&mut text, glyph.data[0], "x origin");
            write_db(&mut text, glyph.data[1], "y origin");
            for &byte in &glyph.data[2..] {
                write_db(&mut text, byte, &move_comment(byte));
            }
        }

        fs::write(output, text).map_err(|err| {
            StageError::new(18, format!("{PLUGIN_NAME}: cannot write output file: {err}"))
        })
    }
}
