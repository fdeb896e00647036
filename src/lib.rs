//! # snatch
//!
//! A bitmap-font processing toolchain built around a three-stage plugin
//! pipeline: an **extractor** rasterizes or loads glyph data into a
//! shared [`font::Font`] value, an optional **transformer** re-encodes it
//! (Partner Bitmap and Partner Tiny wire formats, dithering), and an
//! **exporter** writes the result to disk (raw bytes, C arrays, SDCC
//! assembly, PNG previews).
//!
//! ## Module Structure
//!
//! - [`font`]: the cross-stage data model (glyph bitmaps, font value,
//!   tagged payloads)
//! - [`options`]: last-wins `key=value` option bags
//! - [`glyph`]: bitmap analysis and the 2-opt pen-route optimizer
//! - [`codec`]: the Partner Bitmap and Partner Tiny wire codecs
//! - [`plugin`]: stage traits, the stable C ABI, and the plugin host
//! - [`extract`] / [`transform`] / [`export`]: the built-in stages
//! - [`pipeline`]: stage resolution, parameter routing, orchestration
//!
//! ## Usage
//!
//! ```ignore
//! use snatch::pipeline::{self, PipelineConfig};
//! use snatch::plugin::PluginHost;
//!
//! let mut host = PluginHost::with_builtins();
//! host.load_from_dirs_in_order(&pipeline::plugin_search_dirs(None));
//!
//! let config = PipelineConfig {
//!     extractor_parameters: "input=font.ttf,font_size=16".to_string(),
//!     exporter: Some("bin".to_string()),
//!     exporter_parameters: "output=font.bin".to_string(),
//!     ..Default::default()
//! };
//! pipeline::run(&host, &config)?;
//! ```
//!
//! External plugins are shared objects exporting `snatch_plugin_get`;
//! see [`plugin::abi`] for the flat value block and function signatures
//! the host validates before use.

pub mod codec;
pub mod error;
pub mod export;
pub mod extract;
pub mod font;
pub mod glyph;
pub mod options;
pub mod pipeline;
pub mod plugin;
pub mod transform;

pub use error::PipelineError;
pub use font::Font;
pub use options::OptionBag;
pub use pipeline::PipelineConfig;
pub use plugin::PluginHost;

use plugin::PluginRecord;

/// Every built-in stage, in registration order. Names registered here
/// take precedence over same-named external plugins.
pub fn builtin_plugins() -> Vec<PluginRecord> {
    vec![
        extract::ttf::plugin(),
        extract::image_sheet::plugin(),
        extract::passthrough::plugin(),
        extract::tiny_bin::plugin(),
        transform::partner_bitmap::plugin(),
        transform::partner_tiny::plugin(),
        transform::tiny_raster::plugin(),
        transform::dither::plugin(),
        export::raw_bin::plugin(),
        export::raw_c::plugin(),
        export::png_grid::plugin(),
        export::partner_asm::plugin(),
        export::partner_bitmap_asm::plugin(),
    ]
}
