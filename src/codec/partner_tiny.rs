//! The Partner Tiny codec: vectorizes 1bpp glyphs into packed pen-move
//! streams and reconstructs rasters from them.
//!
//! A move is a single byte laid out `c0 | |dx| | |dy| | sy | sx | c1`
//! (bits 7..0): two-bit delta magnitudes, sign bits (1 = negative), and a
//! two-bit color code `(c1 << 1) | c0` where 0 = travel, 1 = paint
//! foreground, 2 = paint background, 3 = toggle.
//!
//! The encoder always emits travel moves followed by a rest paint at
//! `(0, 0)`; the decoder also accepts the merged paint-with-movement form.

use thiserror::Error;

use crate::codec::{push_u16_le, read_u16_le, HEADER_LEN, MAX_STREAM_LEN};
use crate::font::{stride_for_bits, BitmapFont, GlyphBitmap, TinyFont, TinyGlyph};
use crate::glyph::{foreground_pixels, RouteOptimizer, RoutePoint};

/// Color code of a travel move: the pen moves without painting.
pub const COLOR_NONE: u8 = 0;
/// Color code that sets pixels along the move.
pub const COLOR_FORE: u8 = 1;
/// Color code that clears pixels along the move.
pub const COLOR_BACK: u8 = 2;
/// Color code that toggles pixels along the move.
pub const COLOR_TOGGLE: u8 = 3;

/// Glyph class tag (bits 5..7) marking a tiny-vector record.
pub const GLYPH_CLASS_TINY: u8 = 1;

/// Longest travel step representable by one move byte.
pub const MAX_STEP: i32 = 3;

/// Errors from Partner Tiny encode/serialize/decode, each with a stable
/// code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartnerTinyError {
    #[error("bitmap font data missing")]
    MissingBitmap,
    #[error("invalid codepoint range")]
    InvalidRange,
    #[error("glyph move count exceeds 255")]
    TooManyMoves,
    #[error("glyph payload too large")]
    GlyphTooLarge,
    #[error("serialized font too large (>64KiB)")]
    StreamTooLarge,
    #[error("invalid partner tiny stream payload")]
    BadPayload,
    #[error("invalid codepoint range in tiny stream")]
    BadStreamRange,
    #[error("truncated tiny stream offset table")]
    TruncatedOffsets,
    #[error("invalid glyph offset")]
    BadGlyphOffset,
    #[error("invalid glyph dimensions")]
    BadGlyphDimensions,
    #[error("truncated glyph move data")]
    TruncatedMoves,
}

impl PartnerTinyError {
    /// Stable integer code, shared with the external plugin ABI.
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingBitmap => 30,
            Self::InvalidRange => 31,
            Self::TooManyMoves => 32,
            Self::GlyphTooLarge => 33,
            Self::StreamTooLarge => 34,
            Self::BadPayload => 40,
            Self::BadStreamRange => 41,
            Self::TruncatedOffsets => 42,
            Self::BadGlyphOffset => 43,
            Self::BadGlyphDimensions => 44,
            Self::TruncatedMoves => 45,
        }
    }
}

/// One decoded pen move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TinyMove {
    pub dx: i32,
    pub dy: i32,
    pub color: u8,
}

/// Packs a move into its wire byte. Deltas are clamped to `[-3, 3]`.
pub fn encode_move(mv: TinyMove) -> u8 {
    let dx = mv.dx.clamp(-MAX_STEP, MAX_STEP);
    let dy = mv.dy.clamp(-MAX_STEP, MAX_STEP);
    let sx = u8::from(dx < 0);
    let sy = u8::from(dy < 0);
    let c0 = mv.color & 1;
    let c1 = (mv.color >> 1) & 1;

    (c0 << 7)
        | ((dx.unsigned_abs() as u8) << 5)
        | ((dy.unsigned_abs() as u8) << 3)
        | (sy << 2)
        | (sx << 1)
        | c1
}

/// Unpacks a wire byte into its move.
pub fn decode_move(byte: u8) -> TinyMove {
    let adx = i32::from((byte >> 5) & 0x03);
    let ady = i32::from((byte >> 3) & 0x03);
    let sx = if (byte >> 1) & 1 == 1 { -1 } else { 1 };
    let sy = if (byte >> 2) & 1 == 1 { -1 } else { 1 };
    let color = ((byte >> 7) & 1) | ((byte & 1) << 1);
    TinyMove {
        dx: sx * adx,
        dy: sy * ady,
        color,
    }
}

/// Splits `(dx, dy)` into greedy travel steps of at most `MAX_STEP` per
/// axis, signs matching the remaining delta.
fn append_travel_steps(out: &mut Vec<TinyMove>, dx: i32, dy: i32) {
    let mut rem_x = dx;
    let mut rem_y = dy;
    while rem_x != 0 || rem_y != 0 {
        let step_x = rem_x.clamp(-MAX_STEP, MAX_STEP);
        let step_y = rem_y.clamp(-MAX_STEP, MAX_STEP);
        out.push(TinyMove {
            dx: step_x,
            dy: step_y,
            color: COLOR_NONE,
        });
        rem_x -= step_x;
        rem_y -= step_y;
    }
}

/// Vectorizes one glyph into a move list.
///
/// Foreground pixels are walked in row-major order, reordered by the 2-opt
/// optimizer when there are at least 4 of them and `optimize_route` holds.
/// The first point becomes the origin; an initial rest paint draws it.
/// Returns the ordered points alongside the moves so the caller can read
/// the origin.
pub fn vectorize_glyph(glyph: &GlyphBitmap, optimize_route: bool) -> (Vec<RoutePoint>, Vec<TinyMove>) {
    let mut points = foreground_pixels(glyph, 1);
    if points.is_empty() {
        return (points, Vec::new());
    }
    if optimize_route && points.len() >= 4 {
        points = RouteOptimizer::default().tsp_2opt(&points);
    }

    let mut moves = Vec::new();
    moves.push(TinyMove {
        dx: 0,
        dy: 0,
        color: COLOR_FORE,
    });

    let mut cx = points[0].x;
    let mut cy = points[0].y;
    for point in points.iter().skip(1) {
        append_travel_steps(&mut moves, point.x - cx, point.y - cy);
        moves.push(TinyMove {
            dx: 0,
            dy: 0,
            color: COLOR_FORE,
        });
        cx = point.x;
        cy = point.y;
    }
    (points, moves)
}

/// Encodes `[first, last]` of `font` into a structured Tiny record.
pub fn encode_font(
    font: Option<&BitmapFont>,
    first: i32,
    last: i32,
    fallback_width: i32,
    fallback_height: i32,
    optimize_route: bool,
) -> Result<TinyFont, PartnerTinyError> {
    let font = font.ok_or(PartnerTinyError::MissingBitmap)?;
    if first < 0 || last < first || last > 255 {
        return Err(PartnerTinyError::InvalidRange);
    }

    let mut out = TinyFont::default();
    let mut max_width = fallback_width.max(1);
    let mut max_height = fallback_height.max(1);
    out.glyphs.reserve((last - first + 1) as usize);

    for cp in first..=last {
        let glyph = font.glyph(cp);
        let gw = glyph.map_or(fallback_width, |g| g.width).max(1);
        let gh = glyph.map_or(fallback_height, |g| g.height).max(1);
        max_width = max_width.max(gw);
        max_height = max_height.max(gh);

        let mut record = TinyGlyph {
            codepoint: cp as u16,
            width_minus_one: (gw - 1).clamp(0, 255) as u8,
            height_minus_one: (gh - 1).clamp(0, 255) as u8,
            data: Vec::new(),
        };

        if let Some(glyph) = glyph {
            let (points, moves) = vectorize_glyph(glyph, optimize_route);
            if !moves.is_empty() {
                if moves.len() > 255 {
                    return Err(PartnerTinyError::TooManyMoves);
                }
                if moves.len() + 2 > MAX_STREAM_LEN {
                    return Err(PartnerTinyError::GlyphTooLarge);
                }
                record.data.reserve(moves.len() + 2);
                record.data.push(points[0].x.clamp(0, 255) as u8);
                record.data.push(points[0].y.clamp(0, 255) as u8);
                record.data.extend(moves.iter().map(|&m| encode_move(m)));
            }
        }
        out.glyphs.push(record);
    }

    out.max_width_minus_one = (max_width - 1).clamp(0, 255) as u8;
    out.max_height_minus_one = (max_height - 1).clamp(0, 255) as u8;
    Ok(out)
}

/// Serializes a structured Tiny record into the byte stream the decoder
/// accepts: header, offset table, then per-glyph records
/// `{class, width-1, height-1, move_count, x_origin, y_origin, moves...}`.
pub fn serialize(
    tiny: &TinyFont,
    first: i32,
    last: i32,
    flags: u8,
) -> Result<Vec<u8>, PartnerTinyError> {
    if first < 0 || last < first || last > 255 {
        return Err(PartnerTinyError::InvalidRange);
    }
    if tiny.glyphs.len() != (last - first + 1) as usize {
        return Err(PartnerTinyError::InvalidRange);
    }

    let mut offsets = Vec::with_capacity(tiny.glyphs.len());
    let mut offset = HEADER_LEN + tiny.glyphs.len() * 2;
    for glyph in &tiny.glyphs {
        if !glyph.data.is_empty() && glyph.data.len() < 2 {
            return Err(PartnerTinyError::GlyphTooLarge);
        }
        if glyph.data.len() > 2 + 255 {
            return Err(PartnerTinyError::TooManyMoves);
        }
        if offset > MAX_STREAM_LEN {
            return Err(PartnerTinyError::StreamTooLarge);
        }
        offsets.push(offset as u16);
        offset += 4 + glyph.data.len();
    }
    if offset > MAX_STREAM_LEN {
        return Err(PartnerTinyError::StreamTooLarge);
    }

    let mut bytes = Vec::with_capacity(offset);
    bytes.push(flags);
    bytes.push(tiny.max_width_minus_one);
    bytes.push(tiny.max_height_minus_one);
    bytes.push(first as u8);
    bytes.push(last as u8);
    for off in offsets {
        push_u16_le(&mut bytes, off);
    }
    for glyph in &tiny.glyphs {
        bytes.push(GLYPH_CLASS_TINY << 5);
        bytes.push(glyph.width_minus_one);
        bytes.push(glyph.height_minus_one);
        bytes.push(glyph.data.len().saturating_sub(2) as u8);
        bytes.extend_from_slice(&glyph.data);
    }
    Ok(bytes)
}

/// A raster reconstruction of a Tiny stream.
#[derive(Debug, Clone)]
pub struct DecodedTiny {
    pub max_width: i32,
    pub max_height: i32,
    pub first_codepoint: i32,
    pub last_codepoint: i32,
    pub font: BitmapFont,
}

/// Writes one pixel honoring the paint color; out-of-range writes are
/// silently dropped.
fn write_pixel(glyph: &mut GlyphBitmap, x: i32, y: i32, color: u8) {
    if x < 0 || y < 0 || x >= glyph.width || y >= glyph.height {
        return;
    }
    let index = (y * glyph.stride + x / 8) as usize;
    let mask = 1u8 << (7 - (x % 8));
    match color {
        COLOR_FORE => glyph.data[index] |= mask,
        COLOR_BACK => glyph.data[index] &= !mask,
        COLOR_TOGGLE => glyph.data[index] ^= mask,
        _ => {}
    }
}

/// Bresenham line from `(x0, y0)` to `(x1, y1)`, inclusive.
fn draw_line(glyph: &mut GlyphBitmap, mut x0: i32, mut y0: i32, mut x1: i32, mut y1: i32, color: u8) {
    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    if steep {
        std::mem::swap(&mut x0, &mut y0);
        std::mem::swap(&mut x1, &mut y1);
    }
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
        std::mem::swap(&mut y0, &mut y1);
    }

    let dx = x1 - x0;
    let dy = (y1 - y0).abs();
    let mut error = dx / 2;
    let ystep = if y0 < y1 { 1 } else { -1 };
    let mut y = y0;

    for x in x0..=x1 {
        if steep {
            write_pixel(glyph, y, x, color);
        } else {
            write_pixel(glyph, x, y, color);
        }
        error -= dy;
        if error < 0 {
            y += ystep;
            error += dx;
        }
    }
}

/// Decodes a complete Partner Tiny byte stream back into packed rasters.
pub fn decode_stream(bytes: &[u8]) -> Result<DecodedTiny, PartnerTinyError> {
    if bytes.len() < HEADER_LEN {
        return Err(PartnerTinyError::BadPayload);
    }
    let max_width = i32::from(bytes[1]) + 1;
    let max_height = i32::from(bytes[2]) + 1;
    let first = i32::from(bytes[3]);
    let last = i32::from(bytes[4]);
    if last < first {
        return Err(PartnerTinyError::BadStreamRange);
    }

    let glyph_count = (last - first + 1) as usize;
    if bytes.len() < HEADER_LEN + glyph_count * 2 {
        return Err(PartnerTinyError::TruncatedOffsets);
    }

    let mut glyphs = Vec::with_capacity(glyph_count);
    for i in 0..glyph_count {
        let off = read_u16_le(bytes, HEADER_LEN + i * 2) as usize;
        if off + 4 > bytes.len() {
            return Err(PartnerTinyError::BadGlyphOffset);
        }

        let width = i32::from(bytes[off + 1]) + 1;
        let height = i32::from(bytes[off + 2]) + 1;
        let move_count = bytes[off + 3] as usize;
        if width <= 0 || height <= 0 {
            return Err(PartnerTinyError::BadGlyphDimensions);
        }

        let stride = stride_for_bits(width);
        let mut glyph = GlyphBitmap {
            codepoint: first + i as i32,
            width,
            height,
            bearing_x: 0,
            bearing_y: height,
            advance: width,
            stride,
            data: vec![0; (stride * height) as usize],
        };

        if move_count > 0 {
            let data_start = off + 4;
            if data_start + 2 + move_count > bytes.len() {
                return Err(PartnerTinyError::TruncatedMoves);
            }
            let mut cx = i32::from(bytes[data_start]);
            let mut cy = i32::from(bytes[data_start + 1]);
            for &byte in &bytes[data_start + 2..data_start + 2 + move_count] {
                let mv = decode_move(byte);
                let ex = cx + mv.dx;
                let ey = cy + mv.dy;
                if mv.color != COLOR_NONE {
                    draw_line(&mut glyph, cx, cy, ex, ey, mv.color);
                }
                cx = ex;
                cy = ey;
            }
        }
        glyphs.push(glyph);
    }

    Ok(DecodedTiny {
        max_width,
        max_height,
        first_codepoint: first,
        last_codepoint: last,
        font: BitmapFont::new(glyphs),
    })
}
