//! # imgpacker
//!
//! Packs every image in a folder into a single collage: each image is
//! filtered, resized to a square cell and placed on a row-major grid.
//!
//! # Architecture: One Pass, Five Steps
//!
//! ```text
//! 1. Scan       input/      →  sorted candidates   (signature / SVG sniffing)
//! 2. Transform  candidate   →  cell × cell tile    (parallel, fail-fast)
//! 3. Layout     image count →  grid                (ceil(n / columns) rows)
//! 4. Compose    tiles       →  canvas              (placement by index)
//! 5. Write      canvas      →  output file         (lossless, atomic)
//! ```
//!
//! Every step before the write is free of side effects on the destination,
//! so a run either produces a complete collage or leaves the output path
//! untouched.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Lists the input folder and classifies each file |
//! | [`imaging`] | Stage planning, the transform backend and grid arithmetic |
//! | [`compose`] | Tile placement, lossless encoding, atomic writes |
//! | [`pipeline`] | Runs the steps above and reports progress events |
//! | [`config`] | `imgpacker.toml` loading, validation and the immutable [`config::TransformConfig`] |
//! | [`types`] | Candidates, tiles and format tags shared between steps |
//! | [`output`] | CLI output formatting for events, errors and the summary |
//!
//! # Design Decisions
//!
//! ## Fixed Stage Order
//!
//! Flags only switch stages on or off. The order is always flatten, blur,
//! sharpen, median, flip, flop, resize, then blur, sharpen and median again
//! at cell size. See [`imaging::plan_stages`].
//!
//! ## Placement by Index, Not Completion
//!
//! Tiles are produced in parallel and finish in any order. Each carries the
//! index its source got from the sorted scan, and the compositor places by
//! that index, so output is reproducible run to run.
//!
//! ## Fail-Fast
//!
//! A collage with a missing tile is worse than no collage. The first decode
//! or transform error aborts the run before anything is composed.
//!
//! ## Pure-Rust Imaging
//!
//! Raster decoding, filtering and encoding use the `image` crate; SVG is
//! rasterized with `resvg`. No system libraries are needed.

pub mod compose;
pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
