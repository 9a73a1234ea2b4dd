//! Per-image transforms and grid arithmetic.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode raster** | `image::load_from_memory_with_format` |
//! | **Decode SVG** | `usvg` parse + `resvg` rasterize |
//! | **Flatten / median** | hand-written pixel loops |
//! | **Blur / sharpen / flip / flop** | `image::DynamicImage` methods |
//! | **Resize** | `resize_exact` with `Lanczos3` |
//!
//! The module is split into:
//! - **Calculations**: Pure grid layout math (unit testable)
//! - **Parameters**: The [`Stage`] values a transform is made of
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Stage planning and the per-image transform

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{GridLayout, LayoutError, MAX_CANVAS_BYTES, compute_layout, rgba_bytes};
pub use operations::{plan_stages, transform};
pub use params::{Sharpening, Stage};
pub use rust_backend::RustBackend;
