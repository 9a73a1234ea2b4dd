//! Shared test utilities for the imgpacker test suite.
//!
//! Writers for small synthetic input files in every supported format, so
//! tests never depend on checked-in binary fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_png(&tmp.path().join("a.png"), 16, 16, [255, 0, 0, 255]);
//! write_svg(&tmp.path().join("b.svg"));
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;

/// A 20×10 SVG: red left half, blue right half.
pub const SAMPLE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10" viewBox="0 0 20 10">
  <rect x="0" y="0" width="10" height="10" fill="#ff0000"/>
  <rect x="10" y="0" width="10" height="10" fill="#0000ff"/>
</svg>"##;

// =========================================================================
// Fixture writers
// =========================================================================

/// Write a solid-color PNG.
pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    DynamicImage::ImageRgba8(img)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Write a gradient JPEG.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    DynamicImage::ImageRgb8(img)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

/// Write a solid green GIF.
pub fn write_gif(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 255, 0, 255]));
    DynamicImage::ImageRgba8(img)
        .save_with_format(path, ImageFormat::Gif)
        .unwrap();
}

/// Write [`SAMPLE_SVG`].
pub fn write_svg(path: &Path) {
    std::fs::write(path, SAMPLE_SVG).unwrap();
}

/// Write a file with a valid PNG signature but a truncated body, so it
/// passes classification and fails to decode.
pub fn write_corrupt_png(path: &Path) {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 16]);
    std::fs::write(path, bytes).unwrap();
}

// =========================================================================
// Pixel assertions
// =========================================================================

/// Assert every pixel in the `side × side` block at `(x0, y0)` equals `expected`.
pub fn assert_block(img: &RgbaImage, x0: u32, y0: u32, side: u32, expected: [u8; 4]) {
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            assert_eq!(
                img.get_pixel(x, y).0,
                expected,
                "pixel ({x}, {y}) in block at ({x0}, {y0})"
            );
        }
    }
}
