//! The stable C ABI crossing the host/plugin boundary.
//!
//! Externally built plugins export a single symbol,
//! `snatch_plugin_get`, which populates a pointer to a static
//! [`RawPluginInfo`] block. All strings are NUL-terminated C strings
//! owned by the plugin; all buffers referenced by a stage call must stay
//! valid until the next call into the same plugin.

use std::os::raw::{c_char, c_int, c_uint, c_void};

/// ABI version constant mirrored by `crate::plugin::ABI_VERSION`.
pub const SNATCH_PLUGIN_ABI_VERSION: c_uint = 1;

/// The discovery symbol resolved from every shared object.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"snatch_plugin_get\0";

/// Size of the error buffer handed to every external stage call.
pub const ERRBUF_LEN: usize = 512;

pub const SNATCH_PLUGIN_KIND_EXTRACTOR: c_uint = 1;
pub const SNATCH_PLUGIN_KIND_TRANSFORMER: c_uint = 2;
pub const SNATCH_PLUGIN_KIND_EXPORTER: c_uint = 3;

/// One `key=value` option pair.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawKv {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// A packed 1bpp glyph view.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawGlyphBitmap {
    pub codepoint: c_int,
    pub width: c_int,
    pub height: c_int,
    pub bearing_x: c_int,
    pub bearing_y: c_int,
    pub advance_x: c_int,
    pub stride_bytes: c_int,
    pub data: *const u8,
}

/// A glyph table view.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawBitmapFont {
    pub glyph_count: c_int,
    pub glyphs: *const RawGlyphBitmap,
}

/// The font value as seen across the boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawFont {
    pub name: *const c_char,
    pub glyph_width: c_int,
    pub glyph_height: c_int,
    pub first_codepoint: c_int,
    pub last_codepoint: c_int,
    pub pixel_size: c_int,
    pub bitmap_font: *const RawBitmapFont,
    /// Magic-tagged payload; see the `Raw*Data` blocks below.
    pub user_data: *const c_void,
}

impl RawFont {
    pub fn null() -> Self {
        Self {
            name: std::ptr::null(),
            glyph_width: 0,
            glyph_height: 0,
            first_codepoint: 0,
            last_codepoint: 0,
            pixel_size: 0,
            bitmap_font: std::ptr::null(),
            user_data: std::ptr::null(),
        }
    }
}

/// Common prefix of every payload block: magic then version.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPayloadHeader {
    pub magic: u32,
    pub version: u16,
}

/// Serialized Partner Bitmap stream payload ("PBTM").
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawBitmapStreamData {
    pub magic: u32,
    pub version: u16,
    pub bytes: *const u8,
    pub size: u32,
}

/// Raw Partner Tiny byte stream payload ("PTNB").
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawTinyStreamData {
    pub magic: u32,
    pub version: u16,
    pub bytes: *const u8,
    pub size: u32,
}

/// One encoded Partner Tiny glyph.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawTinyGlyph {
    pub codepoint: u16,
    pub width_minus_one: u8,
    pub height_minus_one: u8,
    /// Length of `data`, including the origin pair.
    pub data_size: u16,
    pub data: *const u8,
}

/// Structured Partner Tiny record payload ("PTNY").
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawTinyFontData {
    pub magic: u32,
    pub version: u16,
    pub glyph_count: u16,
    pub max_width_minus_one: u8,
    pub max_height_minus_one: u8,
    pub glyphs: *const RawTinyGlyph,
}

/// Grayscale passthrough image payload ("IPTH").
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPassthroughData {
    pub magic: u32,
    pub version: u16,
    pub width: u16,
    pub height: u16,
    pub stride: u16,
    pub pixels: *const u8,
}

/// Extractor entry point: fills a fresh font value whose buffers the
/// plugin owns. Returns 0 on success.
pub type RawExtractFn = unsafe extern "C" fn(
    input_path: *const c_char,
    options: *const RawKv,
    options_count: c_uint,
    out_font: *mut RawFont,
    errbuf: *mut c_char,
    errbuf_len: c_uint,
) -> c_int;

/// Transformer entry point: mutates the font value in place. Returns 0 on
/// success.
pub type RawTransformFn = unsafe extern "C" fn(
    font: *mut RawFont,
    options: *const RawKv,
    options_count: c_uint,
    errbuf: *mut c_char,
    errbuf_len: c_uint,
) -> c_int;

/// Exporter entry point: writes a file at `output_path`. Returns 0 on
/// success.
pub type RawExportFn = unsafe extern "C" fn(
    font: *const RawFont,
    output_path: *const c_char,
    options: *const RawKv,
    options_count: c_uint,
    errbuf: *mut c_char,
    errbuf_len: c_uint,
) -> c_int;

/// The static metadata block yielded by the discovery entry point.
///
/// Exactly one of the three function pointers must be populated, matching
/// `kind`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPluginInfo {
    pub name: *const c_char,
    pub description: *const c_char,
    pub author: *const c_char,
    pub format: *const c_char,
    pub standard: *const c_char,
    pub abi_version: c_uint,
    pub kind: c_uint,
    pub transform: Option<RawTransformFn>,
    pub export: Option<RawExportFn>,
    pub extract: Option<RawExtractFn>,
}

/// Discovery entry point type: `int snatch_plugin_get(const
/// snatch_plugin_info** out)`.
pub type RawPluginGetFn = unsafe extern "C" fn(out: *mut *const RawPluginInfo) -> c_int;
