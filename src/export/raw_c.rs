//! C-array exporter: renders the selected byte stream as a `const
//! uint8_t` declaration.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::export::{check_raw_range, identifier_from_output, sanitize_identifier, stream_bytes_from_payload};
use crate::font::Font;
use crate::options::OptionBag;
use crate::plugin::{Export, PluginKind, PluginMeta, PluginRecord, Stage, StageError};

pub const PLUGIN_NAME: &str = "raw_c";

pub fn plugin() -> PluginRecord {
    PluginRecord::builtin(
        PluginMeta {
            name: PLUGIN_NAME.to_string(),
            description: "Exports raw bytes as a C uint8_t array (raw bitmap or transformer stream)"
                .to_string(),
            author: "snatch project".to_string(),
            format: "c".to_string(),
            standard: "raw-1bpp".to_string(),
            abi_version: crate::plugin::ABI_VERSION,
            kind: PluginKind::Exporter,
        },
        Stage::Export(Box::new(RawCExporter)),
    )
}

/// Positive integer option bounded to 1..=1024, with a default.
fn bounded_option(
    options: &OptionBag,
    key: &str,
    default: i32,
    code: i32,
) -> Result<i32, StageError> {
    match options.get_non_empty(key) {
        None => Ok(default),
        Some(raw) => crate::options::parse_int(raw)
            .filter(|v| (1..=1024).contains(v))
            .ok_or_else(|| {
                StageError::new(code, format!("{PLUGIN_NAME}: {key} must be in range 1..1024"))
            }),
    }
}

/// Raster fallback: each glyph occupies a `bytes_per_row * rows` cell,
/// copied from the glyph's top-left corner.
fn packed_cells(
    font: &Font,
    bytes_per_row: i32,
    rows: i32,
) -> Result<Vec<u8>, StageError> {
    let bitmap = font
        .bitmap
        .as_ref()
        .ok_or_else(|| StageError::new(10, format!("{PLUGIN_NAME}: bitmap font data missing")))?;
    check_raw_range(font, PLUGIN_NAME, 15)?;

    let glyph_count = (font.last_codepoint - font.first_codepoint + 1) as usize;
    let cell_bytes = (bytes_per_row * rows) as usize;
    let mut packed = vec![0u8; glyph_count * cell_bytes];
    let max_width_bits = bytes_per_row * 8;

    for cp in font.first_codepoint..=font.last_codepoint {
        let glyph = match bitmap.glyph(cp) {
            Some(g) if !g.is_blank() => g,
            _ => continue,
        };
        let base = (cp - font.first_codepoint) as usize * cell_bytes;
        for y in 0..rows.min(glyph.height) {
            for x in 0..max_width_bits.min(glyph.width) {
                if !glyph.bit(x, y) {
                    continue;
                }
                let index = base + (y * bytes_per_row + x / 8) as usize;
                packed[index] |= 1u8 << (7 - (x % 8));
            }
        }
    }
    Ok(packed)
}

/// Renders the byte array as C source text.
fn render_c_source(
    file_name: &str,
    symbol: &str,
    bytes: &[u8],
    bytes_per_line: usize,
    include_stdint: bool,
    hex_prefix: bool,
    uppercase_hex: bool,
) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "// {file_name}");
    let _ = writeln!(text, "// .bin raw binary rendered as C array.");
    let _ = writeln!(text, "//");
    let _ = writeln!(text, "// Format is .bin, size (in bytes) is {}.", bytes.len());
    if include_stdint {
        text.push_str("#include <stdint.h>\n\n");
    }
    let _ = writeln!(text, "const uint8_t {symbol}[] = {{");

    for (i, byte) in bytes.iter().enumerate() {
        if i % bytes_per_line == 0 {
            text.push_str("    ");
        }
        if hex_prefix {
            text.push_str("0x");
        }
        let _ = if uppercase_hex {
            write!(text, "{byte:02X}")
        } else {
            write!(text, "{byte:02x}")
        };
        if i + 1 < bytes.len() {
            text.push_str(", ");
        }
        if (i + 1) % bytes_per_line == 0 {
            text.push('\n');
        }
    }
    if bytes.len() % bytes_per_line != 0 {
        text.push('\n');
    }
    text.push_str("};\n");
    text
}

pub struct RawCExporter;

impl Export for RawCExporter {
    fn export(&self, font: &Font, output: &Path, options: &OptionBag) -> Result<(), StageError> {
        if output.as_os_str().is_empty() {
            return Err(StageError::new(11, "raw_c: output path is empty"));
        }

        let bytes_per_line = bounded_option(options, "bytes_per_line", 8, 14)?;

        let packed = match stream_bytes_from_payload(font, PLUGIN_NAME)? {
            Some(bytes) => bytes,
            None => {
                let default_row = (font.glyph_width.max(1) + 7) / 8;
                let bytes_per_row = bounded_option(options, "bytes_per_row", default_row, 12)?;
                let rows = bounded_option(options, "rows", font.glyph_height.max(1), 13)?;
                packed_cells(font, bytes_per_row, rows)?
            }
        };

        let mut symbol = identifier_from_output(output, "font");
        if let Some(requested) = options.get_non_empty("symbol") {
            symbol = sanitize_identifier(requested, "font");
        }

        let include_stdint = options.get_bool("include_stdint", true);
        let hex_prefix = options.get_bool("hex_prefix", true);
        let uppercase_hex = options.get_bool("uppercase_hex", false);

        let file_name = output
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = render_c_source(
            &file_name,
            &symbol,
            &packed,
            bytes_per_line as usize,
            include_stdint,
            hex_prefix,
            uppercase_hex,
        );

        fs::write(output, text)
            .map_err(|err| StageError::new(16, format!("raw_c: cannot write output file: {err}")))
    }
}
