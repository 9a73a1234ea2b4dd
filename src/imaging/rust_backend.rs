//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, TIFF, GIF) | `image::load_from_memory_with_format` |
//! | Decode (SVG) | `usvg::Tree` + `resvg::render` at the document's own size |
//! | Flatten alpha | per-pixel "over" composite onto an opaque color |
//! | Blur | `DynamicImage::blur` (Gaussian) |
//! | Sharpen | `DynamicImage::unsharpen` |
//! | Median | [`median_filter`], clamped-edge window |
//! | Flip / flop | `DynamicImage::flipv` / `DynamicImage::fliph` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//!
//! GIF inputs decode to their first frame. SVG documents are parsed with the
//! system fonts loaded, so `<text>` renders, and are rejected before
//! rasterizing when their canvas would exceed [`MAX_CANVAS_BYTES`].

use super::backend::{BackendError, ImageBackend};
use super::calculations::{MAX_CANVAS_BYTES, rgba_bytes};
use super::params::Stage;
use crate::config::Color;
use crate::types::{ImageCandidate, ImageFormatTag};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use resvg::tiny_skia;
use std::sync::{Arc, LazyLock};

/// System fonts, loaded on first use and shared by every SVG parse.
static SYSTEM_FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Options for parsing SVG input. Shared with the scanner so a document is
/// read the same way when classified and when decoded.
pub(crate) fn svg_options() -> usvg::Options<'static> {
    usvg::Options {
        fontdb: Arc::clone(&SYSTEM_FONTS),
        ..Default::default()
    }
}

/// Pure Rust backend using the `image` and `resvg` crates.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode raster bytes whose format was already identified by the scanner.
fn decode_raster(bytes: &[u8], format: image::ImageFormat) -> Result<DynamicImage, BackendError> {
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Parse and rasterize an SVG document at its intrinsic size.
fn rasterize_svg(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let tree = usvg::Tree::from_data(bytes, &svg_options())
        .map_err(|e| BackendError::Decode(format!("invalid SVG: {e}")))?;
    let size = tree.size().to_int_size();
    if rgba_bytes(size.width(), size.height()) > MAX_CANVAS_BYTES {
        return Err(BackendError::Decode(format!(
            "SVG canvas {}x{} exceeds the {} MiB decode limit",
            size.width(),
            size.height(),
            MAX_CANVAS_BYTES >> 20
        )));
    }
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        BackendError::Decode(format!(
            "cannot allocate {}x{} SVG canvas",
            size.width(),
            size.height()
        ))
    })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; the rest of the pipeline does not.
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(size.width(), size.height(), rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| BackendError::Decode("SVG raster has unexpected length".into()))
}

/// Composite every pixel over an opaque `background`.
fn flatten_alpha(image: &DynamicImage, background: Color) -> DynamicImage {
    let [back_r, back_g, back_b, _] = background.0;
    let mut rgba = image.to_rgba8();
    for px in rgba.pixels_mut() {
        let [r, g, b, a] = px.0;
        let a = a as u32;
        let over = |fg: u8, back: u8| ((fg as u32 * a + back as u32 * (255 - a) + 127) / 255) as u8;
        *px = Rgba([over(r, back_r), over(g, back_g), over(b, back_b), 255]);
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Per-channel median filter over a `(2 * radius + 1)²` window.
///
/// Coordinates outside the image are clamped to the nearest edge pixel, so
/// every window holds the same odd number of samples.
pub fn median_filter(src: &RgbaImage, radius: u32) -> RgbaImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 || radius == 0 {
        return src.clone();
    }
    let r = radius as i64;
    let window = ((2 * r + 1) * (2 * r + 1)) as usize;
    let mid = window / 2;
    let mut channels: [Vec<u8>; 4] = std::array::from_fn(|_| Vec::with_capacity(window));

    RgbaImage::from_fn(width, height, |x, y| {
        for channel in channels.iter_mut() {
            channel.clear();
        }
        for dy in -r..=r {
            let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
            for dx in -r..=r {
                let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                let px = src.get_pixel(sx, sy).0;
                for (channel, value) in channels.iter_mut().zip(px) {
                    channel.push(value);
                }
            }
        }
        let mut out = [0u8; 4];
        for (slot, channel) in out.iter_mut().zip(channels.iter_mut()) {
            *slot = *channel.select_nth_unstable(mid).1;
        }
        Rgba(out)
    })
}

impl ImageBackend for RustBackend {
    fn decode(&self, candidate: &ImageCandidate) -> Result<DynamicImage, BackendError> {
        let bytes = candidate.read_bytes()?;
        match candidate.format {
            ImageFormatTag::Svg => rasterize_svg(&bytes),
            tag => match tag.raster_format() {
                Some(format) => decode_raster(&bytes, format),
                None => Err(BackendError::Decode(format!(
                    "{} is not a supported image",
                    candidate.display_name()
                ))),
            },
        }
    }

    fn apply(&self, image: DynamicImage, stage: &Stage) -> Result<DynamicImage, BackendError> {
        let out = match *stage {
            Stage::FlattenAlpha { background } => flatten_alpha(&image, background),
            Stage::Blur { sigma } => image.blur(sigma),
            Stage::Sharpen(sharpening) => image.unsharpen(sharpening.sigma, sharpening.threshold),
            Stage::Median { radius } => {
                DynamicImage::ImageRgba8(median_filter(&image.to_rgba8(), radius))
            }
            Stage::FlipVertical => image.flipv(),
            Stage::FlopHorizontal => image.fliph(),
            Stage::Resize { size } => {
                if size == 0 {
                    return Err(BackendError::ProcessingFailed(
                        "resize target must be non-zero".into(),
                    ));
                }
                image.resize_exact(size, size, FilterType::Lanczos3)
            }
        };
        Ok(out)
    }
}
