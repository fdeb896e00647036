//! Serializer for the Partner Bitmap wire format.
//!
//! Layout (all multi-byte integers little-endian):
//!
//! | offset | field         | width | meaning                                   |
//! |--------|---------------|-------|-------------------------------------------|
//! | 0      | flags         | 1     | bit 7 prop; bits 4..6 space; bits 0..3 spacing |
//! | 1      | max_width     | 1     | clamped to 0..255                         |
//! | 2      | max_height    | 1     | clamped to 0..255                         |
//! | 3      | first         | 1     | 0 <= first <= last <= 255                 |
//! | 4      | last          | 1     |                                           |
//! | 5      | offset table  | 2*N   | absolute byte offsets from stream start   |
//! | ...    | glyph records | var   | class, width, height, length, payload     |

use thiserror::Error;

use crate::codec::{pack_flags, push_u16_le, HEADER_LEN, MAX_STREAM_LEN};
use crate::font::{BitmapFont, GlyphBitmap};

/// Glyph class tag stored in bits 5..7 of each record's first byte.
pub const GLYPH_CLASS_BITMAP: u8 = 0;

/// Errors from Partner Bitmap serialization, each with a stable code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartnerBitmapError {
    #[error("bitmap font data missing")]
    MissingBitmap,
    #[error("invalid codepoint range")]
    InvalidRange,
    #[error("letter_spacing must be 0..15")]
    InvalidLetterSpacing,
    #[error("space_width must be 0..7")]
    InvalidSpaceWidth,
    #[error("space_width is required when proportional=true")]
    SpaceWidthRequired,
    #[error("glyph payload too large for Partner format")]
    GlyphTooLarge,
    #[error("serialized font too large (>64KiB)")]
    StreamTooLarge,
}

impl PartnerBitmapError {
    /// Stable integer code, shared with the external plugin ABI.
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingBitmap => 30,
            Self::InvalidRange => 31,
            Self::InvalidLetterSpacing => 32,
            Self::InvalidSpaceWidth => 33,
            Self::SpaceWidthRequired => 34,
            Self::GlyphTooLarge => 35,
            Self::StreamTooLarge => 36,
        }
    }
}

/// Validated serialization parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartnerBitmapParams {
    pub proportional: bool,
    pub letter_spacing: u8,
    pub space_width: u8,
}

impl PartnerBitmapParams {
    /// Checks the Partner flag-field ranges and the proportional /
    /// space-width coupling.
    pub fn validate(
        proportional: bool,
        letter_spacing: i32,
        space_width: Option<i32>,
    ) -> Result<Self, PartnerBitmapError> {
        if !(0..=15).contains(&letter_spacing) {
            return Err(PartnerBitmapError::InvalidLetterSpacing);
        }
        if let Some(sw) = space_width {
            if !(0..=7).contains(&sw) {
                return Err(PartnerBitmapError::InvalidSpaceWidth);
            }
        }
        if proportional && space_width.is_none() {
            return Err(PartnerBitmapError::SpaceWidthRequired);
        }
        Ok(Self {
            proportional,
            letter_spacing: letter_spacing as u8,
            space_width: space_width.unwrap_or(0) as u8,
        })
    }
}

/// Vertical cell geometry common to every glyph in the stream.
#[derive(Debug, Clone, Copy)]
pub struct CellMetrics {
    pub max_width: i32,
    pub max_bearing_y: i32,
    pub cell_height: i32,
}

/// Computes shared cell geometry over the glyphs of `[first, last]`.
pub fn cell_metrics(font: &BitmapFont, first: i32, last: i32) -> CellMetrics {
    let mut max_width = 0;
    let mut max_bearing_y = 0;
    let mut min_descender = 0;
    for cp in first..=last {
        if let Some(g) = font.glyph(cp) {
            max_width = max_width.max(g.width);
            max_bearing_y = max_bearing_y.max(g.bearing_y);
            min_descender = min_descender.min(g.bearing_y - g.height);
        }
    }
    CellMetrics {
        max_width,
        max_bearing_y,
        cell_height: (max_bearing_y - min_descender).max(1),
    }
}

/// A glyph packed into its cell, ready for the stream.
#[derive(Debug, Clone, Default)]
pub struct PackedCell {
    pub width: u8,
    pub height: u8,
    pub bytes_per_row: i32,
    pub payload: Vec<u8>,
}

/// Copies `glyph` into a `cell_width x cell_height` cell, aligning rows to
/// the shared baseline. Rows landing outside the cell and bits beyond the
/// cell width are discarded.
pub fn pack_glyph_rows(
    glyph: Option<&GlyphBitmap>,
    cell_width: i32,
    cell_height: i32,
    max_bearing_y: i32,
) -> PackedCell {
    let mut out = PackedCell {
        width: cell_width.clamp(0, 255) as u8,
        height: cell_height.clamp(0, 255) as u8,
        bytes_per_row: (cell_width + 7) / 8,
        payload: Vec::new(),
    };
    if out.bytes_per_row <= 0 || cell_height <= 0 {
        return out;
    }
    out.payload = vec![0; (out.bytes_per_row * cell_height) as usize];

    let glyph = match glyph {
        Some(g) if !g.is_blank() => g,
        _ => return out,
    };

    let y_offset = max_bearing_y - glyph.bearing_y;
    for y in 0..glyph.height {
        let dst_y = y + y_offset;
        if dst_y < 0 || dst_y >= cell_height {
            continue;
        }
        for x in 0..glyph.width.min(cell_width) {
            if !glyph.bit(x, y) {
                continue;
            }
            let index = (dst_y * out.bytes_per_row + x / 8) as usize;
            out.payload[index] |= 1u8 << (7 - (x % 8));
        }
    }
    out
}

/// Serializes `[first, last]` of `font` into a Partner Bitmap stream.
pub fn serialize(
    font: Option<&BitmapFont>,
    first: i32,
    last: i32,
    params: PartnerBitmapParams,
) -> Result<Vec<u8>, PartnerBitmapError> {
    let font = font.ok_or(PartnerBitmapError::MissingBitmap)?;
    if first < 0 || last < first || last > 255 {
        return Err(PartnerBitmapError::InvalidRange);
    }

    let metrics = cell_metrics(font, first, last);
    let fixed_cell_width = metrics.max_width.max(1);

    let mut cells = Vec::with_capacity((last - first + 1) as usize);
    for cp in first..=last {
        let glyph = font.glyph(cp);
        let cell_width = if params.proportional {
            glyph.map_or(0, |g| g.width).max(0)
        } else {
            fixed_cell_width
        };
        let cell = pack_glyph_rows(glyph, cell_width, metrics.cell_height, metrics.max_bearing_y);
        if cell.payload.len() > 255 {
            return Err(PartnerBitmapError::GlyphTooLarge);
        }
        cells.push(cell);
    }

    let mut offsets = Vec::with_capacity(cells.len());
    let mut offset = HEADER_LEN + cells.len() * 2;
    for cell in &cells {
        if offset > MAX_STREAM_LEN {
            return Err(PartnerBitmapError::StreamTooLarge);
        }
        offsets.push(offset as u16);
        offset += 4 + cell.payload.len();
    }

    let mut bytes = Vec::with_capacity(offset);
    bytes.push(pack_flags(params.proportional, params.space_width, params.letter_spacing));
    bytes.push(metrics.max_width.clamp(0, 255) as u8);
    bytes.push(metrics.cell_height.clamp(0, 255) as u8);
    bytes.push(first as u8);
    bytes.push(last as u8);
    for off in offsets {
        push_u16_le(&mut bytes, off);
    }
    for cell in &cells {
        bytes.push(GLYPH_CLASS_BITMAP << 5);
        bytes.push(cell.width);
        bytes.push(cell.height);
        bytes.push(cell.payload.len() as u8);
        bytes.extend_from_slice(&cell.payload);
    }
    Ok(bytes)
}
