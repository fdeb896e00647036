//! Adapters wrapping externally built plugins into the stage traits.
//!
//! Data crossing the boundary is deep-copied in both directions: outgoing
//! calls build temporary C views over the font value's owned buffers, and
//! anything the plugin hands back (including plugin-owned static buffers)
//! is copied into fresh owned values before the views are torn down.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_uint, c_void};
use std::path::Path;

use log::warn;

use crate::font::{
    BitmapFont, BitmapStream, Font, GlyphBitmap, PassthroughImage, Payload, TinyFont, TinyGlyph,
    TinyStream,
};
use crate::options::OptionBag;
use crate::plugin::abi::{
    RawBitmapFont, RawBitmapStreamData, RawExportFn, RawExtractFn, RawFont, RawGlyphBitmap,
    RawKv, RawPassthroughData, RawPayloadHeader, RawTinyFontData, RawTinyGlyph,
    RawTinyStreamData, RawTransformFn, ERRBUF_LEN,
};
use crate::plugin::{Export, Extract, StageError, Transform};

/// Error code reported when a path or option cannot be represented as a C
/// string.
const MARSHAL_ERROR: i32 = 90;

fn c_string(value: &str, what: &str) -> Result<CString, StageError> {
    CString::new(value).map_err(|_| {
        StageError::new(MARSHAL_ERROR, format!("{what} contains an interior NUL byte"))
    })
}

/// Owns the C strings and pair array for one option bag.
struct KvArena {
    _strings: Vec<CString>,
    pairs: Vec<RawKv>,
}

impl KvArena {
    fn new(options: &OptionBag) -> Result<Self, StageError> {
        let mut strings = Vec::with_capacity(options.len() * 2);
        let mut pairs = Vec::with_capacity(options.len());
        for (key, value) in options.iter() {
            let key = c_string(key, "option key")?;
            let value = c_string(value, "option value")?;
            pairs.push(RawKv {
                key: key.as_ptr(),
                value: value.as_ptr(),
            });
            strings.push(key);
            strings.push(value);
        }
        Ok(Self {
            _strings: strings,
            pairs,
        })
    }

    fn as_ptr(&self) -> *const RawKv {
        if self.pairs.is_empty() {
            std::ptr::null()
        } else {
            self.pairs.as_ptr()
        }
    }

    fn len(&self) -> c_uint {
        self.pairs.len() as c_uint
    }
}

fn errbuf_to_string(errbuf: &[u8]) -> String {
    let end = errbuf.iter().position(|&b| b == 0).unwrap_or(errbuf.len());
    String::from_utf8_lossy(&errbuf[..end]).into_owned()
}

unsafe fn string_from_ptr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe fn slice_from_ptr<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

/// Copies a plugin-owned payload into an owned [`Payload`], dispatching on
/// the magic header. Unknown magics are dropped with a warning.
unsafe fn payload_from_raw(user_data: *const c_void) -> Payload {
    if user_data.is_null() {
        return Payload::None;
    }
    let header = *(user_data as *const RawPayloadHeader);
    match (header.magic, header.version) {
        (BitmapStream::MAGIC, BitmapStream::VERSION) => {
            let data = &*(user_data as *const RawBitmapStreamData);
            Payload::BitmapStream(BitmapStream {
                bytes: slice_from_ptr(data.bytes, data.size as usize).to_vec(),
            })
        }
        (TinyStream::MAGIC, TinyStream::VERSION) => {
            let data = &*(user_data as *const RawTinyStreamData);
            Payload::TinyStream(TinyStream {
                bytes: slice_from_ptr(data.bytes, data.size as usize).to_vec(),
            })
        }
        (TinyFont::MAGIC, TinyFont::VERSION) => {
            let data = &*(user_data as *const RawTinyFontData);
            let raw_glyphs = if data.glyphs.is_null() {
                &[]
            } else {
                std::slice::from_raw_parts(data.glyphs, data.glyph_count as usize)
            };
            let glyphs = raw_glyphs
                .iter()
                .map(|g| TinyGlyph {
                    codepoint: g.codepoint,
                    width_minus_one: g.width_minus_one,
                    height_minus_one: g.height_minus_one,
                    data: slice_from_ptr(g.data, g.data_size as usize).to_vec(),
                })
                .collect();
            Payload::TinyFont(TinyFont {
                max_width_minus_one: data.max_width_minus_one,
                max_height_minus_one: data.max_height_minus_one,
                glyphs,
            })
        }
        (PassthroughImage::MAGIC, PassthroughImage::VERSION) => {
            let data = &*(user_data as *const RawPassthroughData);
            let len = data.stride as usize * data.height as usize;
            Payload::Passthrough(PassthroughImage {
                width: data.width,
                height: data.height,
                stride: data.stride,
                pixels: slice_from_ptr(data.pixels, len).to_vec(),
            })
        }
        (magic, version) => {
            warn!("dropping unrecognized plugin payload (magic {magic:#010x}, version {version})");
            Payload::None
        }
    }
}

/// Copies a plugin-produced font view into an owned [`Font`].
unsafe fn font_from_raw(raw: &RawFont) -> Font {
    let bitmap = if raw.bitmap_font.is_null() {
        None
    } else {
        let table = &*raw.bitmap_font;
        let raw_glyphs = if table.glyphs.is_null() || table.glyph_count <= 0 {
            &[]
        } else {
            std::slice::from_raw_parts(table.glyphs, table.glyph_count as usize)
        };
        let glyphs = raw_glyphs
            .iter()
            .map(|g| {
                let len = if g.stride_bytes > 0 && g.height > 0 {
                    (g.stride_bytes * g.height) as usize
                } else {
                    0
                };
                GlyphBitmap {
                    codepoint: g.codepoint,
                    width: g.width,
                    height: g.height,
                    bearing_x: g.bearing_x,
                    bearing_y: g.bearing_y,
                    advance: g.advance_x,
                    stride: g.stride_bytes,
                    data: slice_from_ptr(g.data, len).to_vec(),
                }
            })
            .collect();
        Some(BitmapFont::new(glyphs))
    };

    Font {
        name: string_from_ptr(raw.name),
        glyph_width: raw.glyph_width,
        glyph_height: raw.glyph_height,
        first_codepoint: raw.first_codepoint,
        last_codepoint: raw.last_codepoint,
        pixel_size: raw.pixel_size,
        bitmap,
        payload: payload_from_raw(raw.user_data),
    }
}

/// Payload view storage for an outgoing call.
enum RawPayloadViews {
    None,
    BitmapStream(Box<RawBitmapStreamData>),
    TinyStream(Box<RawTinyStreamData>),
    TinyFont {
        data: Box<RawTinyFontData>,
        _glyphs: Vec<RawTinyGlyph>,
    },
    Passthrough(Box<RawPassthroughData>),
}

impl RawPayloadViews {
    fn as_ptr(&self) -> *const c_void {
        match self {
            RawPayloadViews::None => std::ptr::null(),
            RawPayloadViews::BitmapStream(b) => &**b as *const _ as *const c_void,
            RawPayloadViews::TinyStream(b) => &**b as *const _ as *const c_void,
            RawPayloadViews::TinyFont { data, .. } => &**data as *const _ as *const c_void,
            RawPayloadViews::Passthrough(b) => &**b as *const _ as *const c_void,
        }
    }
}

/// Borrowing views over a [`Font`], alive for the duration of one call.
struct RawFontViews {
    _name: CString,
    _glyphs: Vec<RawGlyphBitmap>,
    _table: Option<Box<RawBitmapFont>>,
    _payload: RawPayloadViews,
    font: RawFont,
}

impl RawFontViews {
    fn new(font: &Font) -> Result<Self, StageError> {
        let name = c_string(&font.name, "font name")?;

        let (glyphs, table) = match &font.bitmap {
            Some(bitmap) => {
                let glyphs: Vec<RawGlyphBitmap> = bitmap
                    .glyphs
                    .iter()
                    .map(|g| RawGlyphBitmap {
                        codepoint: g.codepoint,
                        width: g.width,
                        height: g.height,
                        bearing_x: g.bearing_x,
                        bearing_y: g.bearing_y,
                        advance_x: g.advance,
                        stride_bytes: g.stride,
                        data: if g.data.is_empty() {
                            std::ptr::null()
                        } else {
                            g.data.as_ptr()
                        },
                    })
                    .collect();
                let table = Box::new(RawBitmapFont {
                    glyph_count: glyphs.len() as i32,
                    glyphs: if glyphs.is_empty() {
                        std::ptr::null()
                    } else {
                        glyphs.as_ptr()
                    },
                });
                (glyphs, Some(table))
            }
            None => (Vec::new(), None),
        };

        let payload = match &font.payload {
            Payload::None => RawPayloadViews::None,
            Payload::BitmapStream(stream) => RawPayloadViews::BitmapStream(Box::new(
                RawBitmapStreamData {
                    magic: BitmapStream::MAGIC,
                    version: BitmapStream::VERSION,
                    bytes: stream.bytes.as_ptr(),
                    size: stream.bytes.len() as u32,
                },
            )),
            Payload::TinyStream(stream) => RawPayloadViews::TinyStream(Box::new(
                RawTinyStreamData {
                    magic: TinyStream::MAGIC,
                    version: TinyStream::VERSION,
                    bytes: stream.bytes.as_ptr(),
                    size: stream.bytes.len() as u32,
                },
            )),
            Payload::TinyFont(tiny) => {
                let glyph_views: Vec<RawTinyGlyph> = tiny
                    .glyphs
                    .iter()
                    .map(|g| RawTinyGlyph {
                        codepoint: g.codepoint,
                        width_minus_one: g.width_minus_one,
                        height_minus_one: g.height_minus_one,
                        data_size: g.data.len() as u16,
                        data: if g.data.is_empty() {
                            std::ptr::null()
                        } else {
                            g.data.as_ptr()
                        },
                    })
                    .collect();
                let data = Box::new(RawTinyFontData {
                    magic: TinyFont::MAGIC,
                    version: TinyFont::VERSION,
                    glyph_count: glyph_views.len() as u16,
                    max_width_minus_one: tiny.max_width_minus_one,
                    max_height_minus_one: tiny.max_height_minus_one,
                    glyphs: if glyph_views.is_empty() {
                        std::ptr::null()
                    } else {
                        glyph_views.as_ptr()
                    },
                });
                RawPayloadViews::TinyFont {
                    data,
                    _glyphs: glyph_views,
                }
            }
            Payload::Passthrough(image) => RawPayloadViews::Passthrough(Box::new(
                RawPassthroughData {
                    magic: PassthroughImage::MAGIC,
                    version: PassthroughImage::VERSION,
                    width: image.width,
                    height: image.height,
                    stride: image.stride,
                    pixels: image.pixels.as_ptr(),
                },
            )),
        };

        let raw = RawFont {
            name: name.as_ptr(),
            glyph_width: font.glyph_width,
            glyph_height: font.glyph_height,
            first_codepoint: font.first_codepoint,
            last_codepoint: font.last_codepoint,
            pixel_size: font.pixel_size,
            bitmap_font: table
                .as_deref()
                .map_or(std::ptr::null(), |t| t as *const RawBitmapFont),
            user_data: payload.as_ptr(),
        };

        Ok(Self {
            _name: name,
            _glyphs: glyphs,
            _table: table,
            _payload: payload,
            font: raw,
        })
    }
}

/// An extractor loaded from a shared object.
pub struct ExternalExtractor {
    entry: RawExtractFn,
}

impl ExternalExtractor {
    pub fn new(entry: RawExtractFn) -> Self {
        Self { entry }
    }
}

impl Extract for ExternalExtractor {
    fn extract(&self, input: &Path, options: &OptionBag) -> Result<Font, StageError> {
        let input = c_string(&input.to_string_lossy(), "input path")?;
        let kv = KvArena::new(options)?;
        let mut raw = RawFont::null();
        let mut errbuf = [0u8; ERRBUF_LEN];

        let rc = unsafe {
            (self.entry)(
                input.as_ptr(),
                kv.as_ptr(),
                kv.len(),
                &mut raw,
                errbuf.as_mut_ptr() as *mut c_char,
                ERRBUF_LEN as c_uint,
            )
        };
        if rc != 0 {
            return Err(StageError::new(rc, errbuf_to_string(&errbuf)));
        }
        Ok(unsafe { font_from_raw(&raw) })
    }
}

/// A transformer loaded from a shared object.
pub struct ExternalTransformer {
    entry: RawTransformFn,
}

impl ExternalTransformer {
    pub fn new(entry: RawTransformFn) -> Self {
        Self { entry }
    }
}

impl Transform for ExternalTransformer {
    fn transform(&self, font: &mut Font, options: &OptionBag) -> Result<(), StageError> {
        let kv = KvArena::new(options)?;
        let views = RawFontViews::new(font)?;
        let mut raw = views.font;
        let mut errbuf = [0u8; ERRBUF_LEN];

        let rc = unsafe {
            (self.entry)(
                &mut raw,
                kv.as_ptr(),
                kv.len(),
                errbuf.as_mut_ptr() as *mut c_char,
                ERRBUF_LEN as c_uint,
            )
        };
        if rc != 0 {
            return Err(StageError::new(rc, errbuf_to_string(&errbuf)));
        }
        // Copy whatever the plugin left in the view back into owned
        // storage before the views are dropped.
        *font = unsafe { font_from_raw(&raw) };
        Ok(())
    }
}

/// An exporter loaded from a shared object.
pub struct ExternalExporter {
    entry: RawExportFn,
}

impl ExternalExporter {
    pub fn new(entry: RawExportFn) -> Self {
        Self { entry }
    }
}

impl Export for ExternalExporter {
    fn export(&self, font: &Font, output: &Path, options: &OptionBag) -> Result<(), StageError> {
        let output = c_string(&output.to_string_lossy(), "output path")?;
        let kv = KvArena::new(options)?;
        let views = RawFontViews::new(font)?;
        let mut errbuf = [0u8; ERRBUF_LEN];

        let rc = unsafe {
            (self.entry)(
                &views.font,
                output.as_ptr(),
                kv.as_ptr(),
                kv.len(),
                errbuf.as_mut_ptr() as *mut c_char,
                ERRBUF_LEN as c_uint,
            )
        };
        if rc != 0 {
            return Err(StageError::new(rc, errbuf_to_string(&errbuf)));
        }
        Ok(())
    }
}
