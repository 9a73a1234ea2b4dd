//! Canvas compositing, encoding and output writing.
//!
//! Tiles are copied onto the canvas as-is: no blending, each tile's alpha
//! channel is kept. Cells past the last tile keep the layout background.
//!
//! A [`Canvas`] is consumed by [`Canvas::encode`], so it can only be
//! encoded once. Encoding happens in memory; [`write_atomic`] then puts the
//! bytes on disk through a temporary sibling file, so a failed run never
//! leaves a truncated image at the destination.

use crate::imaging::{GridLayout, MAX_CANVAS_BYTES, rgba_bytes};
use crate::types::PixelBuffer;
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Expected {expected} tiles, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("Tile {index} is {actual}px, expected {expected}px")]
    TileSize {
        index: usize,
        actual: u32,
        expected: u32,
    },
    #[error("Tile index {index} is out of range for {image_count} images")]
    OutOfBounds { index: usize, image_count: usize },
    #[error("Tile index {0} was placed twice")]
    DuplicateIndex(usize),
    #[error("Canvas {width}x{height} exceeds the {limit} MiB limit", limit = MAX_CANVAS_BYTES >> 20)]
    CanvasTooLarge { width: u32, height: u32 },
    #[error("Encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Lossless output encodings, chosen by the destination's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Tiff,
    /// Lossless WebP.
    WebP,
}

impl OutputFormat {
    /// Pick the encoder for `path`. No extension means PNG.
    ///
    /// Returns `None` for anything else, including lossy formats.
    pub fn from_path(path: &Path) -> Option<Self> {
        let Some(ext) = path.extension() else {
            return Some(Self::Png);
        };
        match ext.to_str()?.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Tiff => ImageFormat::Tiff,
            Self::WebP => ImageFormat::WebP,
        }
    }
}

/// Output surface, `canvas_width × canvas_height`, filled with the layout
/// background until tiles are placed.
#[derive(Debug)]
pub struct Canvas {
    layout: GridLayout,
    image: RgbaImage,
    placed: Vec<bool>,
}

impl Canvas {
    pub fn new(layout: GridLayout) -> Result<Self, ComposeError> {
        let (width, height) = (layout.canvas_width, layout.canvas_height);
        if rgba_bytes(width, height) > MAX_CANVAS_BYTES {
            return Err(ComposeError::CanvasTooLarge { width, height });
        }
        Ok(Self {
            image: RgbaImage::from_pixel(width, height, layout.background.rgba()),
            placed: vec![false; layout.image_count],
            layout,
        })
    }

    /// Copy one tile into its cell.
    pub fn place(&mut self, buffer: &PixelBuffer) -> Result<(), ComposeError> {
        let layout = &self.layout;
        if buffer.index >= layout.image_count {
            return Err(ComposeError::OutOfBounds {
                index: buffer.index,
                image_count: layout.image_count,
            });
        }
        if buffer.image.dimensions() != (layout.cell_size, layout.cell_size) {
            return Err(ComposeError::TileSize {
                index: buffer.index,
                actual: buffer.image.width().max(buffer.image.height()),
                expected: layout.cell_size,
            });
        }
        if std::mem::replace(&mut self.placed[buffer.index], true) {
            return Err(ComposeError::DuplicateIndex(buffer.index));
        }

        let (x, y) = layout.cell_origin(buffer.index);
        image::imageops::replace(&mut self.image, &buffer.image, x as i64, y as i64);
        Ok(())
    }

    /// Encode the finished canvas, consuming it.
    pub fn encode(self, format: OutputFormat) -> Result<Vec<u8>, ComposeError> {
        let mut bytes = Cursor::new(Vec::new());
        self.image.write_to(&mut bytes, format.image_format())?;
        Ok(bytes.into_inner())
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Place every tile on a fresh canvas.
///
/// The tile count must match the count the layout was computed for; each
/// tile lands in the cell given by its own `index`.
pub fn compose(buffers: &[PixelBuffer], layout: &GridLayout) -> Result<Canvas, ComposeError> {
    if buffers.len() != layout.image_count {
        return Err(ComposeError::TileCountMismatch {
            expected: layout.image_count,
            actual: buffers.len(),
        });
    }
    let mut canvas = Canvas::new(*layout)?;
    for buffer in buffers {
        canvas.place(buffer)?;
    }
    Ok(canvas)
}

/// Write `bytes` to `dest` through a temporary file in the same directory.
///
/// The temporary file is removed if anything fails, and `dest` is only
/// replaced by the final rename.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = partial_path(dest);
    let result = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, dest));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Hidden sibling of `dest` used while writing.
pub fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    dest.with_file_name(format!(".{name}.partial"))
}
