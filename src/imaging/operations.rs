//! High-level image operations.
//!
//! [`plan_stages`] turns a [`TransformConfig`] into the ordered list of
//! stages; [`transform`] decodes one candidate and runs that list through a
//! backend. The stage order is fixed:
//!
//! ```text
//! flatten → blur → sharpen → median → flip → flop     (source size)
//! resize to cell_size × cell_size                      (always)
//! blur → sharpen → median                              (cell size)
//! ```

use super::backend::{BackendError, ImageBackend};
use super::params::{Sharpening, Stage};
use crate::config::TransformConfig;
use crate::types::{ImageCandidate, PixelBuffer};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// List the stages a config enables, in execution order.
///
/// Always contains exactly one [`Stage::Resize`].
pub fn plan_stages(config: &TransformConfig) -> Vec<Stage> {
    let flags = config.flags();
    let filters = config.filters();
    let blur = Stage::Blur {
        sigma: filters.blur_sigma,
    };
    let sharpen = Stage::Sharpen(Sharpening {
        sigma: filters.sharpen_sigma,
        threshold: filters.sharpen_threshold,
    });
    let median = Stage::Median {
        radius: filters.median_radius,
    };

    let steps = [
        (
            flags.flatten_alpha,
            Stage::FlattenAlpha {
                background: filters.flatten_background,
            },
        ),
        (flags.blur_before, blur),
        (flags.sharpen_before, sharpen),
        (flags.median_before, median),
        (flags.flip_vertical, Stage::FlipVertical),
        (flags.flop_horizontal, Stage::FlopHorizontal),
        (
            true,
            Stage::Resize {
                size: config.cell_size(),
            },
        ),
        (flags.blur_after, blur),
        (flags.sharpen_after, sharpen),
        (flags.median_after, median),
    ];

    steps
        .into_iter()
        .filter_map(|(enabled, stage)| enabled.then_some(stage))
        .collect()
}

/// Decode `candidate` and run every planned stage, producing its tile.
///
/// Fails if any stage fails, or if the result is not exactly
/// `cell_size × cell_size`.
pub fn transform(
    backend: &impl ImageBackend,
    candidate: &ImageCandidate,
    config: &TransformConfig,
) -> Result<PixelBuffer> {
    let mut image = backend.decode(candidate)?;
    for stage in plan_stages(config) {
        image = backend.apply(image, &stage)?;
    }

    let image = image.into_rgba8();
    let side = config.cell_size();
    if image.dimensions() != (side, side) {
        return Err(BackendError::ProcessingFailed(format!(
            "expected a {side}x{side} tile, got {}x{}",
            image.width(),
            image.height()
        )));
    }

    Ok(PixelBuffer {
        index: candidate.index,
        image,
    })
}
