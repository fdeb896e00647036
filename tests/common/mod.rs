//! Shared fixtures for the pipeline integration tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use snatch::font::{stride_for_bits, BitmapFont, Font, GlyphBitmap};

/// A per-test temporary directory, removed on drop.
pub struct TestDir {
    pub path: PathBuf,
}

impl TestDir {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "snatch_it_{tag}_{}_{}",
            std::process::id(),
            unique_counter()
        ));
        std::fs::create_dir_all(&path).expect("create temp test dir");
        Self { path }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn unique_counter() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Runs the built `snatch` binary with the given arguments.
pub fn run_snatch(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snatch"))
        .args(args)
        .output()
        .expect("run snatch binary")
}

/// Writes a white glyph sheet with one black diagonal stroke per cell.
///
/// The sheet is `columns x rows` cells of `cell_w x cell_h` pixels.
pub fn write_glyph_sheet(path: &Path, columns: u32, rows: u32, cell_w: u32, cell_h: u32) {
    let mut sheet = image::RgbaImage::from_pixel(
        columns * cell_w,
        rows * cell_h,
        image::Rgba([255, 255, 255, 255]),
    );
    for row in 0..rows {
        for col in 0..columns {
            let n = cell_w.min(cell_h);
            for i in 0..n {
                sheet.put_pixel(col * cell_w + i, row * cell_h + i, image::Rgba([0, 0, 0, 255]));
            }
        }
    }
    sheet.save(path).expect("write glyph sheet");
}

/// Builds an in-memory bitmap font whose glyphs carry distinct pixel
/// patterns, for codec round-trip tests.
pub fn sample_bitmap_font(first: i32, last: i32) -> Font {
    let mut glyphs = Vec::new();
    let mut max_width = 0;
    let mut max_height = 0;
    for cp in first..=last {
        let width = 5 + (cp % 3);
        let height = 6;
        let stride = stride_for_bits(width);
        let mut glyph = GlyphBitmap {
            codepoint: cp,
            width,
            height,
            bearing_x: 0,
            bearing_y: height,
            advance: width,
            stride,
            data: vec![0; (stride * height) as usize],
        };
        for i in 0..width.min(height) {
            glyph.set_bit(i, i);
        }
        glyph.set_bit(width - 1, 0);
        max_width = max_width.max(width);
        max_height = max_height.max(height);
        glyphs.push(glyph);
    }
    Font {
        name: "fixture".to_string(),
        glyph_width: max_width,
        glyph_height: max_height,
        first_codepoint: first,
        last_codepoint: last,
        pixel_size: 0,
        bitmap: Some(BitmapFont::new(glyphs)),
        ..Default::default()
    }
}
