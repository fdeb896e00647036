//! End-to-end pipeline scenarios, run both through the library API and by
//! spawning the built binary.

mod common;

use common::{run_snatch, sample_bitmap_font, write_glyph_sheet, TestDir};

use snatch::codec::partner_tiny;
use snatch::extract::image_sheet::ImageSheetExtractor;
use snatch::glyph::foreground_pixels;
use snatch::options::OptionBag;
use snatch::plugin::Extract;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn single_cell_sheet_yields_one_glyph() {
    init_logging();
    let dir = TestDir::new("s1");
    let sheet = dir.file("12x16.png");
    write_glyph_sheet(&sheet, 1, 1, 12, 16);

    let options = OptionBag::parse("columns=1,rows=1,first_ascii=65,last_ascii=65");
    let font = ImageSheetExtractor.extract(&sheet, &options).unwrap();

    assert_eq!(font.codepoint_count(), 1);
    let glyph = font.bitmap.as_ref().unwrap().glyph(65).unwrap();
    assert!(glyph.height >= 1);
    assert!(!foreground_pixels(glyph, 1).is_empty());
}

#[test]
fn cli_extract_to_raw_bin() {
    let dir = TestDir::new("raw_bin");
    let sheet = dir.file("sheet.png");
    write_glyph_sheet(&sheet, 3, 1, 8, 8);
    let out = dir.file("out.bin");

    let output = run_snatch(&[
        "--extractor-parameters",
        &format!("input={},columns=3,rows=1,first_ascii=65,last_ascii=67", sheet.display()),
        "--exporter",
        "raw_bin",
        "--exporter-parameters",
        &format!("output={}", out.display()),
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("extracted with plugin: image_extractor"), "{stdout}");
    assert!(stdout.contains("exported with plugin: raw_bin"), "{stdout}");
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn cli_missing_input_exits_3() {
    let dir = TestDir::new("s3");
    let out = dir.file("out.bin");

    let output = run_snatch(&[
        "--extractor-parameters",
        "first_ascii=65,last_ascii=67,font_size=16",
        "--exporter",
        "raw_bin",
        "--exporter-parameters",
        &format!("output={}", out.display()),
    ]);

    assert_eq!(output.status.code(), Some(3), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("extractor input path is required"), "{stderr}");
}

#[test]
fn cli_partner_bitmap_to_c_array() {
    let dir = TestDir::new("s4");
    let sheet = dir.file("sheet.png");
    write_glyph_sheet(&sheet, 3, 1, 8, 8);
    let out = dir.file("out.c");

    let output = run_snatch(&[
        "--extractor-parameters",
        &format!("input={},columns=3,rows=1,first_ascii=65,last_ascii=67", sheet.display()),
        "--transformer",
        "partner_bitmap_transform",
        "--transformer-parameters",
        "font_mode=proportional,space_width=3,letter_spacing=2",
        "--exporter",
        "raw_c",
        "--exporter-parameters",
        &format!("output={},symbol=test_font", out.display()),
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("transformed with plugin: partner_bitmap_transform"),
        "{stdout}"
    );
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("const uint8_t test_font[]"), "{text}");
}

#[test]
fn cli_space_width_out_of_range_exits_5() {
    let dir = TestDir::new("s7");
    let sheet = dir.file("sheet.png");
    write_glyph_sheet(&sheet, 1, 1, 8, 8);
    let out = dir.file("out.bin");

    let output = run_snatch(&[
        "--extractor-parameters",
        &format!("input={},columns=1,rows=1,first_ascii=65,last_ascii=65", sheet.display()),
        "--transformer",
        "partner_bitmap_transform",
        "--transformer-parameters",
        "space_width=9",
        "--exporter",
        "bin",
        "--exporter-parameters",
        &format!("output={}", out.display()),
    ]);

    assert_eq!(output.status.code(), Some(5), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("space_width must be 0..7"), "{stderr}");
}

#[test]
fn cli_tiny_stream_round_trip_to_png() {
    // First leg: rasterize a sheet, vectorize it, and write the Partner
    // Tiny stream.
    let dir = TestDir::new("s6");
    let sheet = dir.file("sheet.png");
    write_glyph_sheet(&sheet, 2, 1, 6, 6);
    let stream = dir.file("font.bin");

    let output = run_snatch(&[
        "--extractor-parameters",
        &format!("input={},columns=2,rows=1,first_ascii=65,last_ascii=66", sheet.display()),
        "--transformer",
        "partner_tiny_transform",
        "--exporter",
        "bin",
        "--exporter-parameters",
        &format!("output={}", stream.display()),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(std::fs::metadata(&stream).unwrap().len() > 0);

    // Second leg: reload the stream, rebuild rasters, and render a grid.
    let png = dir.file("grid.png");
    let output = run_snatch(&[
        "--extractor",
        "partner_tiny_bin_extractor",
        "--extractor-parameters",
        &format!("input={}", stream.display()),
        "--transformer",
        "partner_tiny_raster_transform",
        "--exporter",
        "png",
        "--exporter-parameters",
        &format!("output={},columns=2,rows=1", png.display()),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(std::fs::metadata(&png).unwrap().len() > 0);

    // The decoded glyphs must carry the same ink as the source cells.
    let source = ImageSheetExtractor
        .extract(
            &sheet,
            &OptionBag::parse("columns=2,rows=1,first_ascii=65,last_ascii=66"),
        )
        .unwrap();
    let decoded = partner_tiny::decode_stream(&std::fs::read(&stream).unwrap()).unwrap();
    for cp in 65..=66 {
        let a = source.bitmap.as_ref().unwrap().glyph(cp).unwrap();
        let b = decoded.font.glyph(cp).unwrap();
        let pixels = |g: &snatch::font::GlyphBitmap| {
            foreground_pixels(g, 1)
                .iter()
                .map(|p| (p.x, p.y))
                .collect::<Vec<_>>()
        };
        assert_eq!(pixels(a), pixels(b), "codepoint {cp}");
    }
}

#[test]
fn cli_unknown_extension_exits_3() {
    let dir = TestDir::new("ext");
    let out = dir.file("out.bin");
    let output = run_snatch(&[
        "--extractor-parameters",
        "input=/tmp/font.xyz",
        "--exporter",
        "bin",
        "--exporter-parameters",
        &format!("output={}", out.display()),
    ]);
    assert_eq!(output.status.code(), Some(3), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("xyz"), "{stderr}");
}

#[test]
fn cli_ambiguous_asm_alias_exits_3() {
    let dir = TestDir::new("asm");
    let sheet = dir.file("sheet.png");
    write_glyph_sheet(&sheet, 1, 1, 8, 8);
    let out = dir.file("out.s");
    let output = run_snatch(&[
        "--extractor-parameters",
        &format!("input={},columns=1,rows=1,first_ascii=65,last_ascii=65", sheet.display()),
        "--exporter",
        "asm",
        "--exporter-parameters",
        &format!("output={}", out.display()),
    ]);
    assert_eq!(output.status.code(), Some(3), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ambiguous"), "{stderr}");
}

#[test]
fn cli_unknown_option_exits_1() {
    let output = run_snatch(&["--no-such-flag"]);
    assert_eq!(output.status.code(), Some(1), "{output:?}");
}

#[test]
fn whole_font_tiny_round_trip() {
    init_logging();
    let font = sample_bitmap_font(40, 50);
    let bitmap = font.bitmap.as_ref().unwrap();
    let tiny =
        partner_tiny::encode_font(Some(bitmap), 40, 50, font.glyph_width, font.glyph_height, true)
            .unwrap();
    let bytes = partner_tiny::serialize(&tiny, 40, 50, 0).unwrap();
    let decoded = partner_tiny::decode_stream(&bytes).unwrap();

    assert_eq!(decoded.font.glyphs.len(), 11);
    for cp in 40..=50 {
        let a = bitmap.glyph(cp).unwrap();
        let b = decoded.font.glyph(cp).unwrap();
        let pixels = |g: &snatch::font::GlyphBitmap| {
            foreground_pixels(g, 1)
                .iter()
                .map(|p| (p.x, p.y))
                .collect::<Vec<_>>()
        };
        assert_eq!(pixels(a), pixels(b), "codepoint {cp}");
    }
}

#[test]
fn cli_dither_pipeline_to_png() {
    let dir = TestDir::new("dither");
    let input = dir.file("photo.png");
    let gradient = image::GrayImage::from_fn(24, 24, |x, y| image::Luma([((x * 10 + y * 5) % 256) as u8]));
    gradient.save(&input).unwrap();
    let out = dir.file("dithered.png");

    let output = run_snatch(&[
        "--extractor",
        "image_passthrough_extractor",
        "--extractor-parameters",
        &format!("input={}", input.display()),
        "--transformer",
        "dither_1bpp_transform",
        "--transformer-parameters",
        "threshold=128",
        "--exporter",
        "png",
        "--exporter-parameters",
        &format!("output={},columns=1,rows=1,padding=0,grid_thickness=0", out.display()),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn cli_tiny_asm_export() {
    let dir = TestDir::new("tinyasm");
    let sheet = dir.file("sheet.png");
    write_glyph_sheet(&sheet, 2, 1, 6, 6);
    let out = dir.file("font.s");

    let output = run_snatch(&[
        "--extractor-parameters",
        &format!("input={},columns=2,rows=1,first_ascii=65,last_ascii=66", sheet.display()),
        "--transformer",
        "partner_tiny_transform",
        "--exporter",
        "partner_sdcc_asm_tiny",
        "--exporter-parameters",
        &format!("output={},module=testfont", out.display()),
    ]);
    assert!(output.status.success(), "{output:?}");
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains(".module testfont"), "{text}");
    assert!(text.contains(";; ascii 65: 'A'"), "{text}");
}
