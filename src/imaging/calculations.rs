//! Pure grid layout calculations.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::config::Color;
use serde::Serialize;
use thiserror::Error;

/// Largest RGBA buffer the packer allocates for a canvas or a decoded SVG.
///
/// Matches the default allocation limit `image` applies to raster decodes.
pub const MAX_CANVAS_BYTES: u64 = 512 * 1024 * 1024;

/// Size in bytes of an 8-bit RGBA buffer of `width × height` pixels.
pub fn rgba_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 4
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Layout needs at least one column")]
    NoColumns,
    #[error("Canvas of {columns}x{rows} cells at {cell_size}px is too large")]
    CanvasTooLarge {
        columns: u32,
        rows: u32,
        cell_size: u32,
    },
    #[error("Too many images for one canvas: {0}")]
    TooManyImages(usize),
}

/// Row-major grid of square cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    /// Number of images the grid was sized for.
    pub image_count: usize,
    pub columns: u32,
    pub rows: u32,
    pub cell_size: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Fill for cells without an image.
    pub background: Color,
}

impl GridLayout {
    /// Total number of cells, filled or not.
    ///
    /// At least `image_count`, and less than `image_count + columns`.
    pub fn capacity(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// Grid cell `(row, col)` of the image at `index`.
    pub fn cell_position(&self, index: usize) -> (u32, u32) {
        let columns = self.columns as usize;
        ((index / columns) as u32, (index % columns) as u32)
    }

    /// Top-left pixel `(x, y)` of the cell at `index`.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let (row, col) = self.cell_position(index);
        (col * self.cell_size, row * self.cell_size)
    }

    pub fn with_background(self, background: Color) -> Self {
        Self { background, ..self }
    }
}

/// Compute the grid for `image_count` tiles of `cell_size` pixels.
///
/// The column count is always `max_columns`, even when there are fewer
/// images than columns. Rows are the ceiling of `image_count / columns`, so
/// every image gets a cell and only the last row can have empty cells.
/// Canvases over [`MAX_CANVAS_BYTES`] are rejected before anything is allocated.
///
/// # Examples
/// ```
/// # use imgpacker::imaging::compute_layout;
/// // 10 images in 4 columns → 3 rows, last two cells empty
/// let layout = compute_layout(10, 4, 16).unwrap();
/// assert_eq!((layout.columns, layout.rows), (4, 3));
/// assert_eq!((layout.canvas_width, layout.canvas_height), (64, 48));
/// ```
pub fn compute_layout(
    image_count: usize,
    max_columns: u32,
    cell_size: u32,
) -> Result<GridLayout, LayoutError> {
    if max_columns == 0 {
        return Err(LayoutError::NoColumns);
    }
    let columns = max_columns;
    let rows = image_count.div_ceil(columns as usize);
    let rows = u32::try_from(rows).map_err(|_| LayoutError::TooManyImages(image_count))?;

    let too_large = || LayoutError::CanvasTooLarge {
        columns,
        rows,
        cell_size,
    };
    let canvas_width = columns.checked_mul(cell_size).ok_or_else(too_large)?;
    let canvas_height = rows.checked_mul(cell_size).ok_or_else(too_large)?;
    if rgba_bytes(canvas_width, canvas_height) > MAX_CANVAS_BYTES {
        return Err(too_large());
    }

    Ok(GridLayout {
        image_count,
        columns,
        rows,
        cell_size,
        canvas_width,
        canvas_height,
        background: Color::TRANSPARENT,
    })
}
