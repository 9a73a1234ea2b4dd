//! Parameter types for image operations.
//!
//! These types describe *what* to do to an image, not *how*. The
//! [`operations`](super::operations) module turns a
//! [`TransformConfig`](crate::config::TransformConfig) into an ordered list of
//! [`Stage`]s and the [`backend`](super::backend) executes them one by one.
//! A mock backend can then check the planned order without touching pixels.

use crate::config::Color;
use std::fmt;

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

/// One step of the per-image transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Composite onto an opaque background, dropping transparency.
    FlattenAlpha { background: Color },
    /// Gaussian blur.
    Blur { sigma: f32 },
    Sharpen(Sharpening),
    /// Per-channel median over a `(2r + 1)²` window.
    Median { radius: u32 },
    /// Mirror top-to-bottom.
    FlipVertical,
    /// Mirror left-to-right.
    FlopHorizontal,
    /// Scale to exactly `size × size`, ignoring aspect ratio.
    Resize { size: u32 },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FlattenAlpha { background } => write!(f, "flatten({background})"),
            Stage::Blur { sigma } => write!(f, "blur({sigma})"),
            Stage::Sharpen(s) => write!(f, "sharpen({}, {})", s.sigma, s.threshold),
            Stage::Median { radius } => write!(f, "median({radius})"),
            Stage::FlipVertical => f.write_str("flip"),
            Stage::FlopHorizontal => f.write_str("flop"),
            Stage::Resize { size } => write!(f, "resize({size}x{size})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Resize { size: 32 }.to_string(), "resize(32x32)");
        assert_eq!(Stage::Median { radius: 2 }.to_string(), "median(2)");
        assert_eq!(
            Stage::FlattenAlpha {
                background: Color::BLACK
            }
            .to_string(),
            "flatten(#000000)"
        );
        assert_eq!(
            Stage::Sharpen(Sharpening {
                sigma: 0.5,
                threshold: 0
            })
            .to_string(),
            "sharpen(0.5, 0)"
        );
    }
}
