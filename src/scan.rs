//! Input discovery and image classification.
//!
//! Lists the entries directly inside the input folder (no recursion),
//! classifies each one and returns the accepted images in grid order.
//!
//! ## Classification Rules
//!
//! Applied in order:
//!
//! 1. Anything that is not a regular file (directories, symlinks to
//!    directories, broken links) is dropped silently.
//! 2. Files with an `.svg` extension, in any letter case, are read in full
//!    and must parse as SVG markup.
//! 3. Every other file is identified by its first [`SIGNATURE_LEN`] bytes.
//!    JPEG, PNG, WebP, TIFF and GIF signatures are accepted.
//!
//! Files failing rule 2 or 3 are reported in [`ScanResult::skipped`] and the
//! run goes on without them.
//!
//! ## Ordering
//!
//! Accepted files are sorted by their full path, compared byte-wise. The
//! sorted position becomes [`ImageCandidate::index`] and decides which grid
//! cell the image lands in.

use crate::imaging::rust_backend::svg_options;
use crate::types::{ImageCandidate, ImageFormatTag};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Number of leading bytes inspected for raster signatures.
pub const SIGNATURE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to list directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not a directory: `{0}`")]
    NotADirectory(PathBuf),
}

/// A file excluded from the run, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of scanning the input folder.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Supported images, sorted, with `index` set to their position.
    pub accepted: Vec<ImageCandidate>,
    /// Regular files that were not recognized as supported images.
    pub skipped: Vec<SkippedFile>,
}

/// Scan `dir` and classify its direct children.
///
/// Paths in `exclude` (e.g. the output file when it lives in the input
/// folder) are ignored without a warning.
pub fn scan(dir: &Path, exclude: &[PathBuf]) -> Result<ScanResult, ScanError> {
    let root = std::path::absolute(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
        let path = entry?.into_path();
        if exclude.iter().any(|ex| ex == &path) {
            continue;
        }
        paths.push(path);
    }
    paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

    let mut result = ScanResult::default();
    for path in paths {
        match classify(&path)? {
            None => {}
            Some(ImageFormatTag::Unsupported) => {
                let reason = if is_svg_path(&path) {
                    "malformed SVG markup"
                } else {
                    "unsupported file format"
                };
                result.skipped.push(SkippedFile {
                    path,
                    reason: reason.to_string(),
                });
            }
            Some(format) => {
                let index = result.accepted.len();
                result.accepted.push(ImageCandidate {
                    index,
                    path,
                    format,
                });
            }
        }
    }
    Ok(result)
}

/// Classify a single path.
///
/// Returns `None` when the path is not a regular file, which is not worth a
/// warning. Unrecognized content yields `Some(ImageFormatTag::Unsupported)`.
pub fn classify(path: &Path) -> Result<Option<ImageFormatTag>, ScanError> {
    // fs::metadata follows symlinks, so a link to a directory is not a file.
    let is_file = fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
    if !is_file {
        return Ok(None);
    }

    let io_err = |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };

    if is_svg_path(path) {
        let content = fs::read(path).map_err(io_err)?;
        return Ok(Some(if is_svg(&content) {
            ImageFormatTag::Svg
        } else {
            ImageFormatTag::Unsupported
        }));
    }

    let mut header = Vec::with_capacity(SIGNATURE_LEN);
    fs::File::open(path)
        .and_then(|f| f.take(SIGNATURE_LEN as u64).read_to_end(&mut header))
        .map_err(io_err)?;
    Ok(Some(detect_signature(&header)))
}

/// Match leading bytes against the supported raster signatures.
pub fn detect_signature(header: &[u8]) -> ImageFormatTag {
    match image::guess_format(header) {
        Ok(image::ImageFormat::Jpeg) => ImageFormatTag::Jpeg,
        Ok(image::ImageFormat::Png) => ImageFormatTag::Png,
        Ok(image::ImageFormat::WebP) => ImageFormatTag::Webp,
        Ok(image::ImageFormat::Tiff) => ImageFormatTag::Tiff,
        Ok(image::ImageFormat::Gif) => ImageFormatTag::Gif,
        _ => ImageFormatTag::Unsupported,
    }
}

/// Whether `content` is well-formed SVG markup.
pub fn is_svg(content: &[u8]) -> bool {
    usvg::Tree::from_data(content, &svg_options()).is_ok()
}

fn is_svg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}
