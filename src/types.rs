//! Shared types passed between pipeline stages.
//!
//! A file moves through the pipeline as an [`ImageCandidate`] (after the
//! scanner accepts it) and comes out of the transform stage as a
//! [`PixelBuffer`], which the compositor places on the canvas.

use image::RgbaImage;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Format detected for a candidate file.
///
/// Raster formats are identified by their leading signature bytes, SVG by
/// parsing the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormatTag {
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    Svg,
    Unsupported,
}

impl ImageFormatTag {
    /// The `image` crate format used to decode raster inputs.
    ///
    /// `None` for SVG (rasterized separately) and unsupported files.
    pub fn raster_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Webp => Some(image::ImageFormat::WebP),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Svg | Self::Unsupported => None,
        }
    }
}

impl fmt::Display for ImageFormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
            Self::Svg => "svg",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A file accepted by the scanner, in its final grid position.
///
/// File content is not held here; the transform stage reads it when the
/// image is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// Ordinal position after sorting, which is also the grid cell index.
    pub index: usize,
    /// Absolute path to the source file.
    pub path: PathBuf,
    pub format: ImageFormatTag,
}

impl ImageCandidate {
    /// Read the full file content.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

/// A fully transformed, `cell_size × cell_size` RGBA tile.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    /// Ordinal of the candidate this tile was produced from.
    pub index: usize,
    pub image: RgbaImage,
}

impl PixelBuffer {
    /// Side length in pixels. Tiles are always square.
    pub fn side(&self) -> u32 {
        self.image.width()
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
